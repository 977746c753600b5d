//! Rewind Session Reducer
//!
//! A session holds every inspected target ("tab"), which of them is focused,
//! and the handle of the channel control messages are routed through.
//!
//! - All state changes go through [`Reducer::transition`]
//! - Transitions are pure: they return the next session plus the effects
//!   (outbound messages, timer cancellations) the caller must execute
//! - Outbound messages are tagged with the target tab id
//! - The action alphabet is closed; unknown kinds are protocol errors

mod action;
mod effect;
mod error;
mod reducer;
mod session;

pub use action::{Action, ActionKind, StepOrigin, TabBatch};
pub use effect::{Effect, MessageKind, MessagePayload, OutboundMessage};
pub use error::SessionError;
pub use reducer::{transition, Reducer, Transition};
pub use session::{ChannelHandle, Session, TabElection};

pub type Result<T> = std::result::Result<T, SessionError>;

//! Rewind Core
//!
//! Runtime shell around the session reducer: the store that owns session
//! state, the outbound channel towards inspected targets and the playback
//! timers.

mod channel;
mod config;
mod error;
mod journal;
mod store;
mod timer;

pub use channel::{MpscChannel, OutboundChannel};
pub use config::Config;
pub use error::{ChannelError, CoreError};
pub use journal::{Journal, JournalEntry, Outcome};
pub use store::Store;
pub use timer::{PlaybackRuntime, Tick, TimerService};

// Re-export the state model
pub use rewind_session::{
    transition, Action, ActionKind, ChannelHandle, Effect, MessageKind, MessagePayload,
    OutboundMessage, Reducer, Session, SessionError, StepOrigin, TabBatch, TabElection,
    Transition,
};
pub use rewind_tabs::{
    BranchHierarchy, BranchLocation, BranchNode, HierarchyTree, Mode, ModeFlag, NodeId, Snapshot,
    TabError, TabId, TabPayload, TabSession, TimerHandle,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}

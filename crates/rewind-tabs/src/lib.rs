//! Rewind Tab Sessions
//!
//! One inspected target ("tab") owns its recorded snapshot history, the
//! playback cursor over it, a detail-view selection, mode flags and the
//! branch hierarchy of recorded actions.
//!
//! Every mutation here is local to a single tab. Cross-tab lifecycle and
//! outbound messaging live in `rewind-session`.

mod error;
mod hierarchy;
mod mode;
mod snapshot;
mod tab;

pub use error::TabError;
pub use hierarchy::{BranchHierarchy, BranchLocation, BranchNode, HierarchyTree, NodeId, ROOT};
pub use mode::{Mode, ModeFlag};
pub use snapshot::{Snapshot, TabId, TimerHandle};
pub use tab::{TabPayload, TabSession};

pub type Result<T> = std::result::Result<T, TabError>;

//! Tab error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TabError {
    #[error("Index {index} out of range for {len} snapshots")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Branch node not found: {0}")]
    NodeNotFound(usize),

    #[error("Unknown mode flag: {0}")]
    UnknownModeFlag(String),
}

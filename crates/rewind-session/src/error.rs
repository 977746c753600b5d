//! Session error types

use thiserror::Error;

use rewind_tabs::TabId;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Malformed action: {0}")]
    MalformedAction(#[source] serde_json::Error),

    #[error("Malformed payload for {kind}: {source}")]
    MalformedPayload {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid tab id: {0}")]
    InvalidTabId(String),

    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("No active tab")]
    NoActiveTab,

    #[error("Tab error: {0}")]
    Tab(#[from] rewind_tabs::TabError),
}

impl SessionError {
    /// Protocol errors mean the sender and this reducer disagree on the
    /// action alphabet. They are fatal; everything else is a rejected action.
    pub fn is_protocol(&self) -> bool {
        match self {
            SessionError::UnknownAction(_)
            | SessionError::MalformedAction(_)
            | SessionError::MalformedPayload { .. }
            | SessionError::InvalidTabId(_) => true,
            SessionError::Tab(rewind_tabs::TabError::UnknownModeFlag(_)) => true,
            SessionError::TabNotFound(_) | SessionError::NoActiveTab | SessionError::Tab(_) => {
                false
            }
        }
    }
}

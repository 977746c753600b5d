//! Side effects produced by a transition
//!
//! Wire shape of an outbound message:
//! ```text
//! { "action": "jumpToSnap", "payload": <snapshot>, "index": 2, "targetId": 7 }
//! ```

use serde::{Deserialize, Serialize};

use rewind_tabs::{ModeFlag, Snapshot, TabId, TimerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    JumpToSnap,
    EmptySnap,
    Import,
    SetPause,
    SetLock,
    SetPersist,
}

impl MessageKind {
    pub fn for_mode(flag: ModeFlag) -> Self {
        match flag {
            ModeFlag::Paused => MessageKind::SetPause,
            ModeFlag::Locked => MessageKind::SetLock,
            ModeFlag::Persist => MessageKind::SetPersist,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::JumpToSnap => "jumpToSnap",
            MessageKind::EmptySnap => "emptySnap",
            MessageKind::Import => "import",
            MessageKind::SetPause => "setPause",
            MessageKind::SetLock => "setLock",
            MessageKind::SetPersist => "setPersist",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessagePayload {
    // Untagged decoding tries variants in order; `Snapshot` accepts anything
    Flag(bool),
    Snapshots(Vec<Snapshot>),
    Snapshot(Snapshot),
}

/// Control message for the inspected target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub action: MessageKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub target_id: TabId,
}

impl OutboundMessage {
    pub fn jump_to_snap(target_id: TabId, snapshot: Option<Snapshot>, index: usize) -> Self {
        Self {
            action: MessageKind::JumpToSnap,
            payload: snapshot.map(MessagePayload::Snapshot),
            index: Some(index),
            target_id,
        }
    }

    pub fn empty_snap(target_id: TabId) -> Self {
        Self {
            action: MessageKind::EmptySnap,
            payload: None,
            index: None,
            target_id,
        }
    }

    pub fn import(target_id: TabId, snapshots: Vec<Snapshot>) -> Self {
        Self {
            action: MessageKind::Import,
            payload: Some(MessagePayload::Snapshots(snapshots)),
            index: None,
            target_id,
        }
    }

    pub fn set_mode(target_id: TabId, flag: ModeFlag, value: bool) -> Self {
        Self {
            action: MessageKind::for_mode(flag),
            payload: Some(MessagePayload::Flag(value)),
            index: None,
            target_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver a message through the outbound channel
    Send(OutboundMessage),
    /// Stop the playback timer behind this handle
    CancelTimer(TimerHandle),
}

impl Effect {
    pub fn message(&self) -> Option<&OutboundMessage> {
        match self {
            Effect::Send(message) => Some(message),
            Effect::CancelTimer(_) => None,
        }
    }
}

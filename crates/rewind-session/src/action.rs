//! Inbound action alphabet
//!
//! Actions arrive on the wire as `{ "type": <KIND>, "payload": <value?> }`.
//! The alphabet is closed: an unknown kind is a protocol error.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use rewind_tabs::{ModeFlag, Snapshot, TabId, TabPayload, TimerHandle};

use crate::error::SessionError;
use crate::session::ChannelHandle;
use crate::Result;

/// Per-target payloads in the order the target reported them
pub type TabBatch = Vec<(TabId, TabPayload)>;

/// Who asked for a forward step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOrigin {
    /// Explicit user navigation; interrupts playback
    User,
    /// A playback tick; leaves playback running
    Timer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MoveBackward,
    MoveForward { origin: StepOrigin },
    ChangeView(usize),
    ChangeSlider(usize),
    Empty,
    SetChannel(ChannelHandle),
    Import(Vec<Snapshot>),
    ToggleMode(ModeFlag),
    Pause,
    Play(TimerHandle),
    InitialConnect(TabBatch),
    NewSnapshots(TabBatch),
    SetTab(TabId),
    DeleteTab(TabId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    MoveBackward,
    MoveForward,
    ChangeView,
    ChangeSlider,
    Empty,
    SetChannel,
    Import,
    ToggleMode,
    Pause,
    Play,
    InitialConnect,
    NewSnapshots,
    SetTab,
    DeleteTab,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::MoveBackward => "MOVE_BACKWARD",
            ActionKind::MoveForward => "MOVE_FORWARD",
            ActionKind::ChangeView => "CHANGE_VIEW",
            ActionKind::ChangeSlider => "CHANGE_SLIDER",
            ActionKind::Empty => "EMPTY",
            ActionKind::SetChannel => "SET_CHANNEL",
            ActionKind::Import => "IMPORT",
            ActionKind::ToggleMode => "TOGGLE_MODE",
            ActionKind::Pause => "PAUSE",
            ActionKind::Play => "PLAY",
            ActionKind::InitialConnect => "INITIAL_CONNECT",
            ActionKind::NewSnapshots => "NEW_SNAPSHOTS",
            ActionKind::SetTab => "SET_TAB",
            ActionKind::DeleteTab => "DELETE_TAB",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = SessionError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "MOVE_BACKWARD" => Ok(ActionKind::MoveBackward),
            "MOVE_FORWARD" => Ok(ActionKind::MoveForward),
            "CHANGE_VIEW" => Ok(ActionKind::ChangeView),
            "CHANGE_SLIDER" => Ok(ActionKind::ChangeSlider),
            "EMPTY" => Ok(ActionKind::Empty),
            "SET_CHANNEL" => Ok(ActionKind::SetChannel),
            "IMPORT" => Ok(ActionKind::Import),
            "TOGGLE_MODE" => Ok(ActionKind::ToggleMode),
            "PAUSE" => Ok(ActionKind::Pause),
            "PLAY" => Ok(ActionKind::Play),
            "INITIAL_CONNECT" => Ok(ActionKind::InitialConnect),
            "NEW_SNAPSHOTS" => Ok(ActionKind::NewSnapshots),
            "SET_TAB" => Ok(ActionKind::SetTab),
            "DELETE_TAB" => Ok(ActionKind::DeleteTab),
            _ => Err(SessionError::UnknownAction(s.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct WireAction {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::MoveBackward => ActionKind::MoveBackward,
            Action::MoveForward { .. } => ActionKind::MoveForward,
            Action::ChangeView(_) => ActionKind::ChangeView,
            Action::ChangeSlider(_) => ActionKind::ChangeSlider,
            Action::Empty => ActionKind::Empty,
            Action::SetChannel(_) => ActionKind::SetChannel,
            Action::Import(_) => ActionKind::Import,
            Action::ToggleMode(_) => ActionKind::ToggleMode,
            Action::Pause => ActionKind::Pause,
            Action::Play(_) => ActionKind::Play,
            Action::InitialConnect(_) => ActionKind::InitialConnect,
            Action::NewSnapshots(_) => ActionKind::NewSnapshots,
            Action::SetTab(_) => ActionKind::SetTab,
            Action::DeleteTab(_) => ActionKind::DeleteTab,
        }
    }

    /// Decode a JSON-encoded wire action
    pub fn from_json(input: &str) -> Result<Self> {
        let wire: WireAction = serde_json::from_str(input).map_err(SessionError::MalformedAction)?;
        Self::from_wire(&wire.kind, wire.payload)
    }

    /// Decode an action from its kind tag and optional payload
    pub fn from_wire(kind: &str, payload: Option<Value>) -> Result<Self> {
        let kind: ActionKind = kind.parse()?;

        let action = match kind {
            ActionKind::MoveBackward => Action::MoveBackward,
            ActionKind::MoveForward => {
                // Any truthy payload marks a playback tick
                let origin = if payload.as_ref().is_some_and(is_truthy) {
                    StepOrigin::Timer
                } else {
                    StepOrigin::User
                };
                Action::MoveForward { origin }
            }
            ActionKind::ChangeView => Action::ChangeView(decode(kind, payload)?),
            ActionKind::ChangeSlider => Action::ChangeSlider(decode(kind, payload)?),
            ActionKind::Empty => Action::Empty,
            ActionKind::SetChannel => Action::SetChannel(decode(kind, payload)?),
            ActionKind::Import => Action::Import(decode(kind, payload)?),
            ActionKind::ToggleMode => {
                let flag: String = decode(kind, payload)?;
                Action::ToggleMode(flag.parse()?)
            }
            ActionKind::Pause => Action::Pause,
            ActionKind::Play => Action::Play(decode(kind, payload)?),
            ActionKind::InitialConnect => Action::InitialConnect(decode_batch(kind, payload)?),
            ActionKind::NewSnapshots => Action::NewSnapshots(decode_batch(kind, payload)?),
            ActionKind::SetTab => Action::SetTab(decode(kind, payload)?),
            ActionKind::DeleteTab => Action::DeleteTab(decode(kind, payload)?),
        };

        Ok(action)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn decode<T: DeserializeOwned>(kind: ActionKind, payload: Option<Value>) -> Result<T> {
    serde_json::from_value(payload.unwrap_or(Value::Null)).map_err(|source| {
        SessionError::MalformedPayload {
            kind: kind.as_str(),
            source,
        }
    })
}

/// Object keyed by tab id; key order is the reporting order
fn decode_batch(kind: ActionKind, payload: Option<Value>) -> Result<TabBatch> {
    let entries: serde_json::Map<String, Value> = decode(kind, payload)?;

    entries
        .into_iter()
        .map(|(key, value)| -> Result<(TabId, TabPayload)> {
            let id: TabId = key
                .parse()
                .map_err(|_| SessionError::InvalidTabId(key.clone()))?;
            Ok((id, decode(kind, Some(value))?))
        })
        .collect()
}

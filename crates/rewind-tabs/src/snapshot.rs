//! Identifiers and the opaque snapshot value

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of an inspected target, as reported by the target itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub u64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TabId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(TabId)
    }
}

impl From<u64> for TabId {
    fn from(id: u64) -> Self {
        TabId(id)
    }
}

/// One recorded state of the inspected target.
///
/// The shape is owned by the target; we only index, count and forward it.
/// Cloning shares the underlying value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Arc<Value>);

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

/// Handle of a running playback timer, issued by the timer service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerHandle(Uuid);

impl TimerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

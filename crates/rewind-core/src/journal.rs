//! Dispatch journal
//!
//! Bounded record of recent dispatch outcomes, newest last.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rewind_session::ActionKind;
use rewind_tabs::TabId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Outcome {
    Applied { effects: usize },
    Rejected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JournalEntry {
    pub at: DateTime<Utc>,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: ActionKind,
    /// Tab focused when the action arrived
    pub tab: Option<TabId>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

fn serialize_kind<S: serde::Serializer>(kind: &ActionKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.as_str())
}

#[derive(Debug, Clone)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    capacity: usize,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, kind: ActionKind, tab: Option<TabId>, outcome: Outcome) {
        if self.capacity == 0 {
            return;
        }

        self.entries.push(JournalEntry {
            at: Utc::now(),
            kind,
            tab,
            outcome,
        });

        if self.entries.len() > self.capacity {
            let overflow = self.entries.len() - self.capacity;
            self.entries.drain(0..overflow);
        }
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

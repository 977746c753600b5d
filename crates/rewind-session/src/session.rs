//! Session data structure

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use rewind_tabs::{TabId, TabSession};

use crate::error::SessionError;
use crate::Result;

/// Opaque reference to the outbound channel the messages are routed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelHandle(Uuid);

impl ChannelHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChannelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rule for picking the focused tab when none is active yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabElection {
    /// Lowest numeric id among the reported tabs
    #[default]
    LowestId,
    /// First tab in the order the target reported them
    FirstReported,
}

impl TabElection {
    /// Pick among `reported` ids that exist in `tabs`
    pub fn elect(self, reported: &[TabId], tabs: &BTreeMap<TabId, TabSession>) -> Option<TabId> {
        let mut candidates = reported.iter().copied().filter(|id| tabs.contains_key(id));
        match self {
            TabElection::LowestId => candidates.min(),
            TabElection::FirstReported => candidates.next(),
        }
    }
}

/// Every inspected target plus the focus and channel routing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub channel: Option<ChannelHandle>,
    pub active_tab: Option<TabId>,
    pub tabs: BTreeMap<TabId, TabSession>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab(&self, id: TabId) -> Option<&TabSession> {
        self.tabs.get(&id)
    }

    pub fn active(&self) -> Option<(TabId, &TabSession)> {
        let id = self.active_tab?;
        self.tabs.get(&id).map(|tab| (id, tab))
    }

    /// The focused tab, for actions that operate on it
    pub fn active_mut(&mut self) -> Result<(TabId, &mut TabSession)> {
        let id = self.active_tab.ok_or(SessionError::NoActiveTab)?;
        self.tabs
            .get_mut(&id)
            .map(|tab| (id, tab))
            .ok_or(SessionError::TabNotFound(id))
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    /// Drop focus if it references a tab that no longer exists
    pub(crate) fn forget_stale_focus(&mut self) {
        if let Some(id) = self.active_tab {
            if !self.tabs.contains_key(&id) {
                self.active_tab = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabs(ids: &[u64]) -> BTreeMap<TabId, TabSession> {
        ids.iter()
            .map(|&id| (TabId(id), TabSession::default()))
            .collect()
    }

    #[test]
    fn test_election_rules() {
        let existing = tabs(&[2, 5]);
        let reported = [TabId(5), TabId(2)];

        assert_eq!(
            TabElection::LowestId.elect(&reported, &existing),
            Some(TabId(2))
        );
        assert_eq!(
            TabElection::FirstReported.elect(&reported, &existing),
            Some(TabId(5))
        );
    }

    #[test]
    fn test_election_skips_unknown_ids() {
        let existing = tabs(&[7]);
        let reported = [TabId(3), TabId(7)];

        assert_eq!(
            TabElection::FirstReported.elect(&reported, &existing),
            Some(TabId(7))
        );
        assert_eq!(TabElection::LowestId.elect(&[TabId(1)], &existing), None);
    }

    #[test]
    fn test_active_mut_without_focus() {
        let mut session = Session::new();
        assert!(matches!(
            session.active_mut(),
            Err(SessionError::NoActiveTab)
        ));

        session.active_tab = Some(TabId(4));
        assert!(matches!(
            session.active_mut(),
            Err(SessionError::TabNotFound(TabId(4)))
        ));
    }
}

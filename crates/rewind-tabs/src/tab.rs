//! Tab session data structure
//!
//! Invariant: while `snapshots` is non-empty,
//! `cursor_index < snapshots.len()` and `view_index`, when set, is in range.
//! Every method below preserves it.

use serde::{Deserialize, Serialize};

use crate::error::TabError;
use crate::hierarchy::{BranchHierarchy, BranchLocation, HierarchyTree};
use crate::mode::{Mode, ModeFlag};
use crate::snapshot::{Snapshot, TimerHandle};
use crate::Result;

/// Per-target state reported by the inspected process. Absent fields leave
/// the tab's current value in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabPayload {
    #[serde(default)]
    pub snapshots: Option<Vec<Snapshot>>,
    #[serde(default)]
    pub mode: Option<Mode>,
    #[serde(default)]
    pub hierarchy: Option<HierarchyTree>,
    #[serde(default, rename = "currLocation")]
    pub current_location: Option<BranchLocation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSession {
    /// Recorded history, oldest first
    pub snapshots: Vec<Snapshot>,
    /// Snapshot currently played back on the target
    pub cursor_index: usize,
    /// Snapshot selected for detail inspection
    pub view_index: Option<usize>,
    pub mode: Mode,
    pub playing: bool,
    pub timer_handle: Option<TimerHandle>,
    pub hierarchy: BranchHierarchy,
}

impl TabSession {
    /// Build a freshly connected tab: cursor at the start, nothing selected, not playing
    pub fn from_payload(payload: TabPayload) -> Result<Self> {
        let mut tab = Self::default();
        tab.apply_payload(payload)?;
        tab.cursor_index = 0;
        Ok(tab)
    }

    /// Merge a pushed payload and snap the cursor to the latest snapshot
    pub fn merge(&mut self, payload: TabPayload) -> Result<()> {
        self.apply_payload(payload)?;
        self.cursor_index = self.snapshots.len().saturating_sub(1);
        Ok(())
    }

    fn apply_payload(&mut self, payload: TabPayload) -> Result<()> {
        let TabPayload {
            snapshots,
            mode,
            hierarchy,
            current_location,
        } = payload;

        // Validate against a scratch copy so a bad location leaves the tab untouched
        let mut next_hierarchy = match hierarchy {
            Some(tree) => BranchHierarchy::from_tree(tree),
            None => self.hierarchy.clone(),
        };
        if let Some(location) = current_location {
            next_hierarchy.jump_to(location.index())?;
        }

        self.hierarchy = next_hierarchy;
        if let Some(snapshots) = snapshots {
            self.snapshots = snapshots;
        }
        if let Some(mode) = mode {
            self.mode = mode;
        }
        self.repair_indices();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.snapshots.len().checked_sub(1)
    }

    pub fn snapshot(&self, index: usize) -> Option<&Snapshot> {
        self.snapshots.get(index)
    }

    pub fn at_end(&self) -> bool {
        self.last_index().map_or(true, |last| self.cursor_index >= last)
    }

    /// Step the cursor back one snapshot, if possible
    pub fn step_backward(&mut self) -> Option<usize> {
        if self.snapshots.is_empty() || self.cursor_index == 0 {
            return None;
        }
        self.cursor_index -= 1;
        Some(self.cursor_index)
    }

    /// Step the cursor forward one snapshot, if possible
    pub fn step_forward(&mut self) -> Option<usize> {
        if self.at_end() {
            return None;
        }
        self.cursor_index += 1;
        Some(self.cursor_index)
    }

    /// Move the cursor to an arbitrary snapshot
    pub fn seek(&mut self, index: usize) -> Result<usize> {
        self.check_index(index)?;
        self.cursor_index = index;
        Ok(index)
    }

    /// Select a snapshot for inspection, or clear the selection if it is
    /// already selected. Returns the new selection.
    pub fn toggle_view(&mut self, index: usize) -> Result<Option<usize>> {
        if self.view_index == Some(index) {
            self.view_index = None;
        } else {
            self.check_index(index)?;
            self.view_index = Some(index);
        }
        Ok(self.view_index)
    }

    /// Replace the whole history
    pub fn import(&mut self, snapshots: Vec<Snapshot>) {
        self.snapshots = snapshots;
        self.repair_indices();
    }

    pub fn toggle_mode(&mut self, flag: ModeFlag) -> bool {
        self.mode.toggle(flag)
    }

    /// Hand over a new timer. Returns a previously held, different handle
    /// which the caller must cancel.
    pub fn start_playback(&mut self, handle: TimerHandle) -> Option<TimerHandle> {
        self.playing = true;
        self.timer_handle
            .replace(handle)
            .filter(|previous| *previous != handle)
    }

    /// Stop playback, releasing the held timer for cancellation
    pub fn stop_playback(&mut self) -> Option<TimerHandle> {
        self.playing = false;
        self.timer_handle.take()
    }

    /// Hard reset: keep only the first snapshot and drop every branch.
    /// Returns the timer to cancel, if one was running.
    pub fn empty(&mut self) -> Option<TimerHandle> {
        tracing::debug!(
            dropped_snapshots = self.snapshots.len().saturating_sub(1),
            dropped_nodes = self.hierarchy.len() - 1,
            "Emptying snapshot history"
        );

        self.snapshots.truncate(1);
        self.cursor_index = 0;
        self.view_index = None;
        self.hierarchy.reset();
        self.stop_playback()
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.snapshots.len() {
            Ok(())
        } else {
            Err(TabError::IndexOutOfRange {
                index,
                len: self.snapshots.len(),
            })
        }
    }

    fn repair_indices(&mut self) {
        let len = self.snapshots.len();
        if self.cursor_index >= len {
            self.cursor_index = len.saturating_sub(1);
        }
        if self.view_index.is_some_and(|v| v >= len) {
            self.view_index = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn history(n: i64) -> Vec<Snapshot> {
        (0..n).map(|i| Snapshot::new(json!({ "n": i }))).collect()
    }

    #[test]
    fn test_from_payload_starts_at_beginning() {
        let tab = TabSession::from_payload(TabPayload {
            snapshots: Some(history(3)),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(tab.cursor_index, 0);
        assert_eq!(tab.view_index, None);
        assert!(!tab.playing);
        assert!(tab.timer_handle.is_none());
    }

    #[test]
    fn test_merge_snaps_to_latest() {
        let mut tab = TabSession::from_payload(TabPayload {
            snapshots: Some(history(1)),
            ..Default::default()
        })
        .unwrap();

        tab.merge(TabPayload {
            snapshots: Some(history(4)),
            mode: Some(Mode {
                locked: true,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(tab.cursor_index, 3);
        assert!(tab.mode.locked);
    }

    #[test]
    fn test_merge_with_bad_location_leaves_tab_untouched() {
        let mut tab = TabSession::from_payload(TabPayload {
            snapshots: Some(history(2)),
            ..Default::default()
        })
        .unwrap();
        let before = tab.clone();

        let result = tab.merge(TabPayload {
            snapshots: Some(history(5)),
            current_location: Some(9.into()),
            ..Default::default()
        });

        assert_eq!(result, Err(TabError::NodeNotFound(9)));
        assert_eq!(tab, before);
    }

    #[test]
    fn test_step_bounds() {
        let mut tab = TabSession::default();
        assert_eq!(tab.step_backward(), None);
        assert_eq!(tab.step_forward(), None);

        tab.import(history(2));
        assert_eq!(tab.step_backward(), None);
        assert_eq!(tab.step_forward(), Some(1));
        assert_eq!(tab.step_forward(), None);
        assert_eq!(tab.step_backward(), Some(0));
    }

    #[test]
    fn test_seek_rejects_out_of_range() {
        let mut tab = TabSession::default();
        tab.import(history(3));

        assert_eq!(tab.seek(2), Ok(2));
        assert_eq!(
            tab.seek(3),
            Err(TabError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(tab.cursor_index, 2);
    }

    #[test]
    fn test_toggle_view() {
        let mut tab = TabSession::default();
        tab.import(history(3));

        assert_eq!(tab.toggle_view(1), Ok(Some(1)));
        assert_eq!(tab.toggle_view(2), Ok(Some(2)));
        assert_eq!(tab.toggle_view(2), Ok(None));
        assert!(tab.toggle_view(5).is_err());
        assert_eq!(tab.view_index, None);
    }

    #[test]
    fn test_import_clamps_indices() {
        let mut tab = TabSession::default();
        tab.import(history(5));
        tab.seek(4).unwrap();
        tab.toggle_view(3).unwrap();

        tab.import(history(2));
        assert_eq!(tab.cursor_index, 1);
        assert_eq!(tab.view_index, None);
    }

    #[test]
    fn test_playback_handles() {
        let mut tab = TabSession::default();
        let first = TimerHandle::new();
        let second = TimerHandle::new();

        assert_eq!(tab.start_playback(first), None);
        assert_eq!(tab.start_playback(first), None);
        assert_eq!(tab.start_playback(second), Some(first));
        assert!(tab.playing);

        assert_eq!(tab.stop_playback(), Some(second));
        assert!(!tab.playing);
        assert_eq!(tab.stop_playback(), None);
    }

    #[test]
    fn test_empty_is_hard_reset() {
        let mut tab = TabSession::default();
        tab.import(history(4));
        tab.seek(3).unwrap();
        tab.toggle_view(2).unwrap();
        tab.hierarchy = BranchHierarchy::from_tree(HierarchyTree {
            index: 0,
            snapshot: None,
            children: vec![HierarchyTree {
                index: 1,
                snapshot: Some(Snapshot::new(json!({ "n": 9 }))),
                children: Vec::new(),
            }],
        });
        tab.hierarchy.jump_to(1).unwrap();
        let handle = TimerHandle::new();
        tab.start_playback(handle);

        assert_eq!(tab.empty(), Some(handle));
        assert_eq!(tab.snapshots, history(1));
        assert_eq!(tab.cursor_index, 0);
        assert_eq!(tab.view_index, None);
        assert!(!tab.playing);
        assert!(tab.hierarchy.is_empty());

        let once = tab.clone();
        assert_eq!(tab.empty(), None);
        assert_eq!(tab, once);
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload: TabPayload = serde_json::from_value(json!({
            "snapshots": [{ "n": 0 }, { "n": 1 }],
            "mode": { "paused": true, "locked": false, "persist": false },
            "hierarchy": { "index": 0, "children": [{ "index": 1 }] },
            "currLocation": 1
        }))
        .unwrap();

        let tab = TabSession::from_payload(payload).unwrap();
        assert_eq!(tab.len(), 2);
        assert!(tab.mode.paused);
        assert_eq!(tab.hierarchy.current_node().index, 1);
    }

    #[test]
    fn test_merge_without_snapshots_keeps_history() {
        let mut tab = TabSession::from_payload(TabPayload {
            snapshots: Some(history(3)),
            ..Default::default()
        })
        .unwrap();

        tab.merge(TabPayload {
            mode: Some(Mode {
                locked: true,
                ..Default::default()
            }),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(tab.snapshots, history(3));
        assert_eq!(tab.cursor_index, 2);
        assert!(tab.mode.locked);
    }

    #[test]
    fn test_payload_location_as_node() {
        let payload: TabPayload = serde_json::from_value(json!({
            "snapshots": [{ "n": 0 }, { "n": 1 }],
            "hierarchy": {
                "index": 0,
                "children": [{ "index": 1, "stateSnapshot": { "n": 1 }, "children": [] }]
            },
            "currLocation": { "index": 1, "stateSnapshot": { "n": 1 }, "children": [] }
        }))
        .unwrap();

        let tab = TabSession::from_payload(payload).unwrap();
        assert_eq!(tab.hierarchy.current_node().index, 1);
        assert_eq!(
            tab.hierarchy.current_node().snapshot,
            Some(Snapshot::new(json!({ "n": 1 })))
        );
    }
}

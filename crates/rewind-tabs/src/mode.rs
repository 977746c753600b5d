//! Mode flags
//!
//! Each flag is mirrored to the inspected target when toggled:
//! ```text
//! paused   -> setPause
//! locked   -> setLock
//! persist  -> setPersist
//! ```

use serde::{Deserialize, Serialize};

use crate::error::TabError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeFlag {
    /// Target stops recording new snapshots
    Paused,
    /// Target is pinned to the currently displayed snapshot
    Locked,
    /// Target keeps its history across page reloads
    Persist,
}

impl ModeFlag {
    pub const ALL: [ModeFlag; 3] = [ModeFlag::Paused, ModeFlag::Locked, ModeFlag::Persist];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModeFlag::Paused => "paused",
            ModeFlag::Locked => "locked",
            ModeFlag::Persist => "persist",
        }
    }
}

impl std::fmt::Display for ModeFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModeFlag {
    type Err = TabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paused" => Ok(ModeFlag::Paused),
            "locked" => Ok(ModeFlag::Locked),
            "persist" => Ok(ModeFlag::Persist),
            _ => Err(TabError::UnknownModeFlag(s.to_string())),
        }
    }
}

/// The independent boolean flags of one tab
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub persist: bool,
}

impl Mode {
    pub fn get(&self, flag: ModeFlag) -> bool {
        match flag {
            ModeFlag::Paused => self.paused,
            ModeFlag::Locked => self.locked,
            ModeFlag::Persist => self.persist,
        }
    }

    /// Flip a flag and return its new value
    pub fn toggle(&mut self, flag: ModeFlag) -> bool {
        let slot = match flag {
            ModeFlag::Paused => &mut self.paused,
            ModeFlag::Locked => &mut self.locked,
            ModeFlag::Persist => &mut self.persist,
        };
        *slot = !*slot;
        *slot
    }
}

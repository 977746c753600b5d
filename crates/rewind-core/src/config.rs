//! Store configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use rewind_session::TabElection;

use crate::error::CoreError;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Period between playback ticks, in milliseconds
    pub playback_interval_ms: u64,
    /// Number of recent dispatch outcomes kept in the journal
    pub journal_capacity: usize,
    /// How the focused tab is picked when none is active
    pub tab_election: TabElection,
}

impl Config {
    /// Parse a (possibly partial) JSON document; missing fields keep their defaults
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.playback_interval_ms == 0 {
            return Err(CoreError::Config(
                "playback_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn playback_interval(&self) -> Duration {
        Duration::from_millis(self.playback_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            playback_interval_ms: 1000,
            journal_capacity: 20,
            tab_election: TabElection::LowestId,
        }
    }
}

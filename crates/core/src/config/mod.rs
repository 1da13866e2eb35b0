use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing sections fall back to their
    /// defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Timing knobs for the playback engine. None of them affect correctness,
/// only how the experience feels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// How often the clock source is polled while running.
    pub poll_interval_ms: u64,
    /// How long the acknowledgment stays up after an input is accepted.
    pub input_ack_ms: u64,
    /// Delay between picking a choice and its ending appearing.
    pub ending_delay_ms: u64,
    /// Lifetime of a fired flash effect.
    pub flash_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            input_ack_ms: 1500,
            ending_delay_ms: 1000,
            flash_ms: 300,
        }
    }
}

impl PlaybackConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn input_ack(&self) -> Duration {
        Duration::from_millis(self.input_ack_ms)
    }

    pub fn ending_delay(&self) -> Duration {
        Duration::from_millis(self.ending_delay_ms)
    }

    pub fn flash(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }
}

//! Settings management

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Engine tuning knobs.
///
/// Missing fields fall back to their defaults when deserializing, so a
/// settings file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Entity ids to reserve room for up front.
    pub initial_entity_capacity: usize,
    /// Number of recent updates kept for timing statistics.
    pub update_timing_window: usize,
    /// Flush once after services are initialized, so families requested
    /// during initialization already reflect setup work.
    pub flush_on_create: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_entity_capacity: 1024,
            update_timing_window: 120,
            flush_on_create: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid engine settings: {0}")]
    Parse(#[from] serde_json::Error),
}

impl EngineSettings {
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

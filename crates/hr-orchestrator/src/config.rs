//! Orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::{
    DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_DEDUP_WINDOW_MS, DEFAULT_JOIN_WINDOW_SECS,
    DEFAULT_REJOIN_TIMEOUT_MS, DEFAULT_RESET_ACTION,
};

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("reset action name must not be empty")]
    EmptyResetAction,
}

/// Timing and payload settings for the reset flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Same-serial suppression window in milliseconds.
    pub dedup_window_ms: u64,
    /// Action response timeout in milliseconds.
    pub action_timeout_ms: u64,
    /// Join window requested after a confirmed reset, in seconds.
    pub join_window_secs: u32,
    /// Rejoin watch timeout in milliseconds.
    pub rejoin_timeout_ms: u64,
    /// Bridge action name.
    pub reset_action: String,
    /// Optional network to direct the reset at. Blank values read as unset.
    #[serde(deserialize_with = "deserialize_pan_id")]
    pub extended_pan_id: Option<String>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            join_window_secs: DEFAULT_JOIN_WINDOW_SECS,
            rejoin_timeout_ms: DEFAULT_REJOIN_TIMEOUT_MS,
            reset_action: DEFAULT_RESET_ACTION.to_string(),
            extended_pan_id: None,
        }
    }
}

impl OrchestratorConfig {
    /// Set the extended PAN id. Blank values clear it.
    #[must_use]
    pub fn with_extended_pan_id(mut self, pan_id: impl Into<String>) -> Self {
        self.extended_pan_id = clean_pan_id(&pan_id.into());
        self
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    pub fn rejoin_timeout(&self) -> Duration {
        Duration::from_millis(self.rejoin_timeout_ms)
    }

    /// Check every duration is non-zero and the action name is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dedup_window_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "dedup_window_ms",
            });
        }
        if self.action_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "action_timeout_ms",
            });
        }
        if self.join_window_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "join_window_secs",
            });
        }
        if self.rejoin_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration {
                field: "rejoin_timeout_ms",
            });
        }
        if self.reset_action.trim().is_empty() {
            return Err(ConfigError::EmptyResetAction);
        }
        Ok(())
    }
}

fn clean_pan_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn deserialize_pan_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(clean_pan_id))
}

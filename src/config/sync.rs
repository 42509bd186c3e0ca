use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Reconciliation settings for the sync coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Interval between local snapshots while a subscription is polling.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Whether writes wait for the remote step.
    #[serde(default)]
    pub remote_writes: RemoteWriteMode,

    /// Field the remote orders list and subscribe results by (descending).
    #[serde(default = "default_order_by")]
    pub order_by: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            remote_writes: RemoteWriteMode::default(),
            order_by: default_order_by(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "sync.poll_interval_ms must be greater than 0".into(),
            ));
        }
        if self.order_by.trim().is_empty() {
            return Err(ConfigError::Validation(
                "sync.order_by cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// How the remote half of a write is scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteWriteMode {
    /// Return once the local write commits; the remote upsert runs on a
    /// tracked background task.
    #[default]
    Detached,
    /// Wait for the remote upsert (its failure is still only logged).
    Awaited,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_order_by() -> String {
    "createdAt".into()
}

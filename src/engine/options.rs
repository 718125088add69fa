//! Global options applied when building a configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfigOptions {
    /// Per-module bound on watcher shutdown, in milliseconds.
    pub shutdown_timeout_ms: u64,

    /// Buffered events per broadcast receiver before it lags.
    pub event_capacity: usize,
}

impl ConfigOptions {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout_ms: 5_000,
            event_capacity: 64,
        }
    }
}

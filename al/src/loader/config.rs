//! Loader configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for load tasks and batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Base unit of the linear retry backoff (attempt n waits n x base)
    #[serde(rename = "backoff-base-ms")]
    pub backoff_base_ms: u64,

    /// Per-index delay added to non-critical batch tasks
    #[serde(rename = "stagger-ms")]
    pub stagger_ms: u64,

    /// Overrides the active strategy's retry count for every task
    #[serde(rename = "retry-count", skip_serializing_if = "Option::is_none")]
    pub retry_count: Option<u32>,

    /// Abort producers that exceed the strategy's timeout hint
    #[serde(rename = "enforce-timeout")]
    pub enforce_timeout: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            backoff_base_ms: 1000,
            stagger_ms: 50,
            retry_count: None,
            enforce_timeout: false,
        }
    }
}

impl LoaderConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn stagger(&self) -> Duration {
        Duration::from_millis(self.stagger_ms)
    }
}

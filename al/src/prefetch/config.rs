//! Prefetch configuration

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::Priority;

/// Pacing of the background pass, plus simulated entries for `al simulate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Idle window awaited before a background pass starts
    #[serde(rename = "idle-delay-ms")]
    pub idle_delay_ms: u64,

    /// Pause after each background entry settles
    #[serde(rename = "item-pause-ms")]
    pub item_pause_ms: u64,

    pub entries: Vec<SimulatedEntry>,

    /// Substring → registry key
    pub patterns: BTreeMap<String, String>,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            idle_delay_ms: 200,
            item_pause_ms: 100,
            entries: Vec::new(),
            patterns: BTreeMap::new(),
        }
    }
}

impl PrefetchConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn item_pause(&self) -> Duration {
        Duration::from_millis(self.item_pause_ms)
    }
}

/// A registry entry backed by a simulated producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatedEntry {
    pub key: String,

    #[serde(default)]
    pub priority: Priority,

    /// How long the simulated producer takes
    #[serde(rename = "latency-ms", default)]
    pub latency_ms: u64,

    /// Number of calls that fail before the producer succeeds
    #[serde(rename = "fail-times", default)]
    pub fail_times: u32,
}

impl SimulatedEntry {
    pub fn new(key: impl Into<String>, priority: Priority, latency_ms: u64) -> Self {
        Self {
            key: key.into(),
            priority,
            latency_ms,
            fail_times: 0,
        }
    }

    pub fn failing(mut self, fail_times: u32) -> Self {
        self.fail_times = fail_times;
        self
    }
}

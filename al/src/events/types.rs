//! Event types for loader activity streaming

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::NetworkTier;
use crate::loader::LoadPhase;
use crate::prefetch::PrefetchStatus;

/// Observable loader activity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LoadEvent {
    /// A load task moved to a new phase
    PhaseChanged {
        source: String,
        phase: LoadPhase,
        attempt: u32,
    },
    /// A load task armed its pre-load delay timer
    DelayStarted { source: String, delay_ms: u64 },
    /// A producer was called
    ProducerInvoked { source: String, attempt: u32 },
    /// A failed attempt will be retried after a backoff
    RetryScheduled {
        source: String,
        attempt: u32,
        backoff_ms: u64,
    },
    /// The monitor observed a tier or online change
    NetworkChanged {
        source: String,
        tier: NetworkTier,
        online: bool,
    },
    /// A prefetch entry changed status
    PrefetchStatusChanged { source: String, status: PrefetchStatus },
}

impl LoadEvent {
    /// The task id, registry key or monitor name that produced the event
    pub fn source(&self) -> &str {
        match self {
            LoadEvent::PhaseChanged { source, .. }
            | LoadEvent::DelayStarted { source, .. }
            | LoadEvent::ProducerInvoked { source, .. }
            | LoadEvent::RetryScheduled { source, .. }
            | LoadEvent::NetworkChanged { source, .. }
            | LoadEvent::PrefetchStatusChanged { source, .. } => source,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            LoadEvent::PhaseChanged { .. } => "PhaseChanged",
            LoadEvent::DelayStarted { .. } => "DelayStarted",
            LoadEvent::ProducerInvoked { .. } => "ProducerInvoked",
            LoadEvent::RetryScheduled { .. } => "RetryScheduled",
            LoadEvent::NetworkChanged { .. } => "NetworkChanged",
            LoadEvent::PrefetchStatusChanged { .. } => "PrefetchStatusChanged",
        }
    }
}

/// A timestamped event log entry for file persistence
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    pub event: LoadEvent,
}

impl EventLogEntry {
    /// Create a new log entry with current timestamp
    pub fn new(event: LoadEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            event,
        }
    }
}

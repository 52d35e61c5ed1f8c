//! Tier-dependent loading strategy

use std::time::Duration;

use serde::Serialize;

use crate::domain::NetworkTier;

/// Knobs derived from the current network tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadingStrategy {
    pub preload_enabled: bool,
    pub animations_enabled: bool,
    pub batch_size: usize,
    /// Advisory per-load timeout; zero when offline
    pub timeout_hint: Duration,
    pub retry_count: u32,
}

impl LoadingStrategy {
    /// Fixed lookup: more capable tiers unlock larger batches and more retries
    pub const fn for_tier(tier: NetworkTier) -> Self {
        match tier {
            NetworkTier::Excellent => Self {
                preload_enabled: true,
                animations_enabled: true,
                batch_size: 6,
                timeout_hint: Duration::from_secs(10),
                retry_count: 3,
            },
            NetworkTier::Good => Self {
                preload_enabled: true,
                animations_enabled: true,
                batch_size: 4,
                timeout_hint: Duration::from_secs(15),
                retry_count: 2,
            },
            NetworkTier::Fair => Self {
                preload_enabled: true,
                animations_enabled: false,
                batch_size: 2,
                timeout_hint: Duration::from_secs(20),
                retry_count: 2,
            },
            NetworkTier::Poor => Self {
                preload_enabled: false,
                animations_enabled: false,
                batch_size: 1,
                timeout_hint: Duration::from_secs(30),
                retry_count: 1,
            },
            NetworkTier::Offline => Self {
                preload_enabled: false,
                animations_enabled: false,
                batch_size: 0,
                timeout_hint: Duration::ZERO,
                retry_count: 0,
            },
        }
    }
}

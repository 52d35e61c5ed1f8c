//! Pre-load delay table keyed by priority and network tier

use std::time::Duration;

use super::{NetworkTier, Priority};

/// What a load task should do before invoking its producer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadDelay {
    /// Wait this long, then load
    Wait(Duration),

    /// Offline and not critical: fail without invoking the producer
    Unavailable,
}

impl PreloadDelay {
    /// The wait duration, if loading may proceed
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Wait(d) => Some(d),
            Self::Unavailable => None,
        }
    }
}

/// Fixed priority x tier delay table
///
/// Every (priority, tier) pair is covered by an exhaustive match, so adding a
/// variant to either enum fails to compile until the table is extended.
pub struct DelayTable;

impl DelayTable {
    /// Delay in milliseconds for an online tier
    ///
    /// For a fixed priority the value never decreases as the tier worsens.
    /// Offline always yields zero; callers consult [`DelayTable::lookup`] for
    /// the offline fail-fast rule.
    pub const fn millis(priority: Priority, tier: NetworkTier) -> u64 {
        use NetworkTier::*;
        use Priority::*;

        match (priority, tier) {
            (_, Offline) => 0,
            (Critical, Excellent | Good | Fair | Poor) => 0,

            (High, Excellent) => 0,
            (High, Good) => 50,
            (High, Fair) => 100,
            (High, Poor) => 200,

            (Medium, Excellent) => 100,
            (Medium, Good) => 200,
            (Medium, Fair) => 400,
            (Medium, Poor) => 800,

            (Low, Excellent) => 300,
            (Low, Good) => 600,
            (Low, Fair) => 1200,
            (Low, Poor) => 2000,

            (Lazy, Excellent) => 1000,
            (Lazy, Good) => 2000,
            (Lazy, Fair) => 3000,
            (Lazy, Poor) => 5000,
        }
    }

    /// Resolve the pre-load delay, applying the offline rule
    pub fn lookup(priority: Priority, tier: NetworkTier) -> PreloadDelay {
        if tier.is_offline() {
            if priority.is_critical() {
                return PreloadDelay::Wait(Duration::ZERO);
            }
            return PreloadDelay::Unavailable;
        }
        PreloadDelay::Wait(Duration::from_millis(Self::millis(priority, tier)))
    }
}

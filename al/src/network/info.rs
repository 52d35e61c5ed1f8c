//! Connectivity signals and their classification

use serde::{Deserialize, Serialize};

use crate::domain::NetworkTier;

/// Placeholder effective type when the platform exposes none
pub const DEFAULT_EFFECTIVE_TYPE: &str = "4g";

/// Placeholder downlink estimate (Mbps)
pub const DEFAULT_DOWNLINK_MBPS: f64 = 10.0;

/// Placeholder round-trip estimate (ms)
pub const DEFAULT_RTT_MS: u32 = 50;

/// Downlink at or above which a 4g connection counts as excellent
const EXCELLENT_DOWNLINK_MBPS: f64 = 5.0;

/// Round-trip at or below which a 4g connection counts as excellent
const EXCELLENT_RTT_MS: u32 = 100;

/// Raw signals as reported by the platform
///
/// Only `online` is guaranteed; the rest are present when the platform
/// exposes a network-information API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivitySignals {
    pub online: bool,
    pub effective_type: Option<String>,
    pub downlink: Option<f64>,
    pub rtt: Option<u32>,
    pub save_data: Option<bool>,
}

impl ConnectivitySignals {
    /// Only the online flag is known
    pub fn online_only(online: bool) -> Self {
        Self {
            online,
            effective_type: None,
            downlink: None,
            rtt: None,
            save_data: None,
        }
    }

    /// Full signal set
    pub fn rich(effective_type: impl Into<String>, downlink: f64, rtt: u32, save_data: bool) -> Self {
        Self {
            online: true,
            effective_type: Some(effective_type.into()),
            downlink: Some(downlink),
            rtt: Some(rtt),
            save_data: Some(save_data),
        }
    }
}

impl Default for ConnectivitySignals {
    fn default() -> Self {
        Self::online_only(true)
    }
}

/// Classified network snapshot
///
/// `online == false` always implies `tier == Offline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub tier: NetworkTier,
    pub effective_type: String,
    pub downlink: f64,
    pub rtt: u32,
    pub save_data: bool,
    pub online: bool,
}

impl NetworkInfo {
    /// Classify raw signals
    pub fn from_signals(signals: &ConnectivitySignals) -> Self {
        let effective_type = signals
            .effective_type
            .clone()
            .unwrap_or_else(|| DEFAULT_EFFECTIVE_TYPE.to_string());
        let downlink = signals.downlink.unwrap_or(DEFAULT_DOWNLINK_MBPS);
        let rtt = signals.rtt.unwrap_or(DEFAULT_RTT_MS);
        let save_data = signals.save_data.unwrap_or(false);

        Self {
            tier: classify(signals),
            effective_type,
            downlink,
            rtt,
            save_data,
            online: signals.online,
        }
    }

    /// Whether observers care about the difference between two snapshots
    pub fn differs_from(&self, other: &NetworkInfo) -> bool {
        self.tier != other.tier || self.online != other.online
    }
}

impl Default for NetworkInfo {
    fn default() -> Self {
        Self::from_signals(&ConnectivitySignals::default())
    }
}

fn classify(signals: &ConnectivitySignals) -> NetworkTier {
    if !signals.online {
        return NetworkTier::Offline;
    }
    if signals.save_data.unwrap_or(false) {
        return NetworkTier::Poor;
    }

    let Some(effective_type) = signals.effective_type.as_deref() else {
        return NetworkTier::Good;
    };

    match effective_type {
        "4g" => match (signals.downlink, signals.rtt) {
            (Some(downlink), Some(rtt)) if downlink >= EXCELLENT_DOWNLINK_MBPS && rtt <= EXCELLENT_RTT_MS => {
                NetworkTier::Excellent
            }
            _ => NetworkTier::Good,
        },
        "3g" => NetworkTier::Fair,
        "2g" | "slow-2g" => NetworkTier::Poor,
        _ => NetworkTier::Good,
    }
}

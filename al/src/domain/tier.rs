//! Network quality tiers

use serde::{Deserialize, Serialize};

/// Discrete network quality classification
///
/// Ordering follows capability: `Excellent` sorts first, `Offline` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkTier {
    Excellent,
    #[default]
    Good,
    Fair,
    Poor,
    Offline,
}

impl NetworkTier {
    /// All tiers, most capable first
    pub const ALL: [NetworkTier; 5] = [
        NetworkTier::Excellent,
        NetworkTier::Good,
        NetworkTier::Fair,
        NetworkTier::Poor,
        NetworkTier::Offline,
    ];

    pub fn is_offline(self) -> bool {
        matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for NetworkTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Excellent => write!(f, "excellent"),
            Self::Good => write!(f, "good"),
            Self::Fair => write!(f, "fair"),
            Self::Poor => write!(f, "poor"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for NetworkTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excellent" => Ok(Self::Excellent),
            "good" => Ok(Self::Good),
            "fair" => Ok(Self::Fair),
            "poor" => Ok(Self::Poor),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Unknown network tier: {}", s)),
        }
    }
}

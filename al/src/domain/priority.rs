//! Priority levels for load scheduling

use serde::{Deserialize, Serialize};

/// Scheduling urgency of a load task or prefetch entry
///
/// Ordering follows urgency: `Critical` sorts first, `Lazy` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Lazy,
}

impl Priority {
    /// All priorities, most urgent first
    pub const ALL: [Priority; 5] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Lazy,
    ];

    /// Whether this priority bypasses offline fail-fast and the batch stagger
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Critical => write!(f, "critical"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
            Self::Lazy => write!(f, "lazy"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Self::Critical),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            "lazy" => Ok(Self::Lazy),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::High < Priority::Medium);
        assert!(Priority::Medium < Priority::Low);
        assert!(Priority::Low < Priority::Lazy);
    }

    #[test]
    fn test_priority_sort_is_urgency_first() {
        let mut priorities = vec![Priority::Lazy, Priority::Critical, Priority::Low, Priority::High];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Critical, Priority::High, Priority::Low, Priority::Lazy]
        );
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::Critical.to_string(), "critical");
        assert_eq!(Priority::Medium.to_string(), "medium");
        assert_eq!(Priority::Lazy.to_string(), "lazy");
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("lazy".parse::<Priority>().unwrap(), Priority::Lazy);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("normal".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_serde() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");

        let priority: Priority = serde_json::from_str("\"critical\"").unwrap();
        assert_eq!(priority, Priority::Critical);
    }
}

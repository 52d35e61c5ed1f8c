//! Adaptive loader configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::loader::LoaderConfig;
use crate::network::ConnectivitySignals;
use crate::prefetch::PrefetchConfig;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Signal polling and simulated connectivity
    pub network: NetworkConfig,

    /// Load task and batch timing
    pub loader: LoaderConfig,

    /// Background prefetch pacing and simulated entries
    pub prefetch: PrefetchConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .adaptiveload.yml
        let local_config = PathBuf::from(".adaptiveload.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/adaptiveload/adaptiveload.yml
        if let Some(user_config) = Self::user_config_path().filter(|p| p.exists()) {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Any failure yields `None`; the full load reports it later.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = match config_path {
            Some(path) => vec![path.clone()],
            None => std::iter::once(PathBuf::from(".adaptiveload.yml"))
                .chain(Self::user_config_path())
                .collect(),
        };
        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(p).ok())
            .and_then(|c| c.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("adaptiveload").join("adaptiveload.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Network signal configuration
///
/// The signal fields describe the connectivity `al simulate` pretends to
/// have when no `--tier` is given. A `--tier` replaces them entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Signal polling interval in milliseconds; 0 disables polling
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    #[serde(rename = "effective-type", skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downlink: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtt: Option<u32>,

    #[serde(rename = "save-data", skip_serializing_if = "Option::is_none")]
    pub save_data: Option<bool>,

    pub online: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            effective_type: None,
            downlink: None,
            rtt: None,
            save_data: None,
            online: true,
        }
    }
}

impl NetworkConfig {
    /// Polling interval, or `None` when polling is disabled
    pub fn poll_interval(&self) -> Option<std::time::Duration> {
        (self.poll_interval_ms > 0).then(|| std::time::Duration::from_millis(self.poll_interval_ms))
    }

    /// Signals described by this section
    pub fn signals(&self) -> ConnectivitySignals {
        ConnectivitySignals {
            online: self.online,
            effective_type: self.effective_type.clone(),
            downlink: self.downlink,
            rtt: self.rtt,
            save_data: self.save_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NetworkTier, Priority};
    use crate::network::NetworkInfo;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.network.poll_interval_ms, 1000);
        assert!(config.network.online);
        assert_eq!(config.network.poll_interval(), Some(std::time::Duration::from_secs(1)));
        assert_eq!(config.loader.stagger_ms, 50);
        assert_eq!(config.prefetch.idle_delay_ms, 200);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_zero_poll_interval_disables_polling() {
        let config: Config = serde_yaml::from_str("network:\n  poll-interval-ms: 0\n").unwrap();
        assert_eq!(config.network.poll_interval(), None);
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
network:
  poll-interval-ms: 250
  effective-type: 3g
  downlink: 1.2
  rtt: 300

loader:
  backoff-base-ms: 500
  stagger-ms: 25
  enforce-timeout: true

prefetch:
  idle-delay-ms: 50
  entries:
    - key: /traditional
      priority: high
      latency-ms: 80

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.network.poll_interval_ms, 250);
        assert_eq!(config.network.poll_interval(), Some(std::time::Duration::from_millis(250)));
        assert_eq!(NetworkInfo::from_signals(&config.network.signals()).tier, NetworkTier::Fair);
        assert_eq!(config.loader.backoff_base_ms, 500);
        assert_eq!(config.loader.stagger_ms, 25);
        assert!(config.loader.enforce_timeout);
        assert_eq!(config.prefetch.idle_delay_ms, 50);
        assert_eq!(config.prefetch.item_pause_ms, 100);
        assert_eq!(config.prefetch.entries[0].priority, Priority::High);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
loader:
  stagger-ms: 10
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        // Specified value
        assert_eq!(config.loader.stagger_ms, 10);

        // Defaults for unspecified
        assert_eq!(config.loader.backoff_base_ms, 1000);
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.prefetch, PrefetchConfig::default());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("adaptiveload.yml");
        fs::write(&path, "log-level: warn\nloader:\n  retry-count: 1\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.loader.retry_count, Some(1));
        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    fn test_load_explicit_path_errors() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("missing.yml");
        assert!(Config::load(Some(&missing)).is_err());
        assert!(Config::load_log_level(Some(&missing)).is_none());

        let broken = temp.path().join("broken.yml");
        fs::write(&broken, "loader: [not, a, map]").unwrap();
        let err = Config::load(Some(&broken)).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config file"));
    }
}

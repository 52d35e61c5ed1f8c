//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::NetworkTier;

/// al - adaptive resource loading inspector
#[derive(Parser)]
#[command(
    name = "al",
    about = "Inspect and simulate network-aware priority loading",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the pre-load delay for every priority and tier
    Delays {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the loading strategy for a tier
    Strategy {
        /// Network tier (excellent, good, fair, poor, offline)
        #[arg(short, long, default_value = "good")]
        tier: NetworkTier,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Run a batch and a prefetch pass over simulated producers
    Simulate {
        /// Network tier to simulate; defaults to the config's signals
        #[arg(short, long)]
        tier: Option<NetworkTier>,

        /// Simulate with the online flag cleared
        #[arg(long)]
        offline: bool,

        /// Append every loader event to this JSONL file
        #[arg(short, long)]
        events: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for command results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("adaptiveload")
        .join("logs")
        .join("adaptiveload.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_parse_simulate() {
        let cli = Cli::try_parse_from(["al", "-l", "debug", "simulate", "--tier", "poor", "--offline"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Command::Simulate {
                tier, offline, events, ..
            } => {
                assert_eq!(tier, Some(NetworkTier::Poor));
                assert!(offline);
                assert!(events.is_none());
            }
            other => panic!("Expected Simulate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_strategy_defaults() {
        let cli = Cli::try_parse_from(["al", "strategy"]).unwrap();
        match cli.command {
            Command::Strategy { tier, format } => {
                assert_eq!(tier, NetworkTier::Good);
                assert_eq!(format, OutputFormat::Text);
            }
            other => panic!("Expected Strategy, got {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_tier() {
        assert!(Cli::try_parse_from(["al", "strategy", "--tier", "blazing"]).is_err());
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("adaptiveload/logs/adaptiveload.log"));
    }
}

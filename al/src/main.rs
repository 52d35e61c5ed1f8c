//! al - adaptive resource loading inspector
//!
//! CLI entry point for printing the delay table and loading strategies and
//! for running simulated loads.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use adaptiveload::cli::{Cli, Command, OutputFormat, get_log_path};
use adaptiveload::config::Config;
use adaptiveload::domain::{DelayTable, NetworkTier, PreloadDelay, Priority};
use adaptiveload::events::{EventBus, spawn_event_logger};
use adaptiveload::loader::LoadPhase;
use adaptiveload::network::LoadingStrategy;
use adaptiveload::simulate::{self, SimulationReport};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Delays { format } => {
            debug!(?format, "main: matched Delays command");
            cmd_delays(format)
        }
        Command::Strategy { tier, format } => {
            debug!(%tier, ?format, "main: matched Strategy command");
            cmd_strategy(tier, format)
        }
        Command::Simulate {
            tier,
            offline,
            events,
            format,
        } => {
            debug!(?tier, offline, ?events, ?format, "main: matched Simulate command");
            cmd_simulate(&config, tier, offline, events, format).await
        }
    }
}

/// Print the delay table
fn cmd_delays(format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_delays: called");

    if format == OutputFormat::Json {
        let rows: Vec<serde_json::Value> = Priority::ALL
            .iter()
            .map(|&priority| {
                let delays: serde_json::Map<String, serde_json::Value> = NetworkTier::ALL
                    .iter()
                    .map(|&tier| {
                        let value = match DelayTable::lookup(priority, tier) {
                            PreloadDelay::Wait(d) => serde_json::json!(d.as_millis() as u64),
                            PreloadDelay::Unavailable => serde_json::Value::Null,
                        };
                        (tier.to_string(), value)
                    })
                    .collect();
                serde_json::json!({ "priority": priority, "delays-ms": delays })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    print!("{:<10}", "priority".bold());
    for tier in NetworkTier::ALL {
        print!("{:>11}", tier.to_string().bold());
    }
    println!();
    for priority in Priority::ALL {
        print!("{:<10}", priority.to_string().cyan());
        for tier in NetworkTier::ALL {
            let cell = match DelayTable::lookup(priority, tier) {
                PreloadDelay::Wait(d) => format!("{}ms", d.as_millis()).normal(),
                PreloadDelay::Unavailable => "fail".red(),
            };
            print!("{:>11}", cell);
        }
        println!();
    }
    Ok(())
}

/// Print the loading strategy for a tier
fn cmd_strategy(tier: NetworkTier, format: OutputFormat) -> Result<()> {
    debug!(%tier, ?format, "cmd_strategy: called");
    let strategy = LoadingStrategy::for_tier(tier);

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&strategy)?);
        return Ok(());
    }

    let flag = |on: bool| if on { "yes".green() } else { "no".red() };
    println!("{} {}", "Tier:".bold(), tier.to_string().cyan());
    println!("  preload:     {}", flag(strategy.preload_enabled));
    println!("  animations:  {}", flag(strategy.animations_enabled));
    println!("  batch size:  {}", strategy.batch_size);
    println!("  timeout:     {:?}", strategy.timeout_hint);
    println!("  retries:     {}", strategy.retry_count);
    Ok(())
}

/// Run a simulated batch and prefetch pass
async fn cmd_simulate(
    config: &Config,
    tier: Option<NetworkTier>,
    offline: bool,
    events: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    debug!(?tier, offline, ?events, ?format, "cmd_simulate: called");

    let mut signals = match tier {
        Some(tier) => simulate::signals_for_tier(tier),
        None => config.network.signals(),
    };
    if offline {
        signals.online = false;
    }

    let bus = EventBus::with_default_capacity();
    let logger = match &events {
        Some(path) => Some(spawn_event_logger(&bus, path).context("Failed to start event logger")?),
        None => None,
    };

    let report = simulate::run(config, signals, &bus).await;

    // Closing the bus lets the logger drain and exit
    drop(bus);
    if let Some(handle) = logger {
        handle.await.context("Event logger task failed")?;
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_report(&report),
    }
    if let Some(path) = events {
        println!("\nEvents written to {}", path.display());
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!(
        "{} {} (preload {}, {} retries)",
        "Tier:".bold(),
        report.tier.to_string().cyan(),
        if report.strategy.preload_enabled { "on" } else { "off" },
        report.strategy.retry_count
    );

    println!("\n{} ({}ms, {:.0}% loaded)", "Batch".bold(), report.batch_ms, report.progress);
    for task in &report.tasks {
        let phase = match task.phase {
            LoadPhase::Loaded => task.phase.to_string().green(),
            LoadPhase::Failed => task.phase.to_string().red(),
            _ => task.phase.to_string().yellow(),
        };
        print!("  {:<16} {:<9} {:<8} attempt {}", task.id, task.priority.to_string(), phase, task.attempt);
        if let Some(error) = &task.error {
            print!("  {}", error.dimmed());
        }
        println!();
    }

    let stats = &report.prefetch_stats;
    println!("\n{} ({}ms)", "Prefetch".bold(), report.prefetch_ms);
    println!(
        "  loaded {}  failed {}{}",
        report.prefetch.loaded.to_string().green(),
        report.prefetch.failed.to_string().red(),
        if report.prefetch.stopped_early { "  (stopped early)" } else { "" }
    );
    println!(
        "  entries: {} idle, {} loading, {} loaded, {} error",
        stats.idle, stats.loading, stats.loaded, stats.error
    );
}

//! Simulated workloads for `al simulate`
//!
//! Builds a monitor over the chosen signals, polls it while running one batch
//! and one background prefetch pass over producers that only sleep and
//! optionally fail.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{NetworkTier, Priority};
use crate::events::EventBus;
use crate::loader::{BatchScheduler, LoadPhase, Producer, producer};
use crate::network::{ConnectivitySignals, LoadingStrategy, NetworkMonitor, SignalSource, StaticSignals};
use crate::prefetch::{PassSummary, PrefetchQueue, PrefetchRegistry, PrefetchStats, SimulatedEntry};

/// Entries used when the config defines none
pub fn default_entries() -> Vec<SimulatedEntry> {
    vec![
        SimulatedEntry::new("/dashboard", Priority::Critical, 50),
        SimulatedEntry::new("/traditional", Priority::High, 120),
        SimulatedEntry::new("/leasing", Priority::Medium, 200).failing(1),
        SimulatedEntry::new("/reports", Priority::Low, 300),
        SimulatedEntry::new("/statements", Priority::Lazy, 150),
    ]
}

/// Representative signals for a tier
pub fn signals_for_tier(tier: NetworkTier) -> ConnectivitySignals {
    match tier {
        NetworkTier::Excellent => ConnectivitySignals::rich("4g", 20.0, 40, false),
        NetworkTier::Good => ConnectivitySignals::rich("4g", 3.0, 150, false),
        NetworkTier::Fair => ConnectivitySignals::rich("3g", 1.5, 300, false),
        NetworkTier::Poor => ConnectivitySignals::rich("2g", 0.2, 1500, false),
        NetworkTier::Offline => ConnectivitySignals::online_only(false),
    }
}

/// Producer that sleeps `latency-ms` and fails its first `fail-times` calls
pub fn simulated_producer(entry: &SimulatedEntry) -> Producer<String> {
    let key = entry.key.clone();
    let latency = Duration::from_millis(entry.latency_ms);
    let fail_times = entry.fail_times;
    let calls = Arc::new(AtomicU32::new(0));
    producer(move || {
        let key = key.clone();
        let call = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            tokio::time::sleep(latency).await;
            if call < fail_times {
                return Err(eyre::eyre!("simulated failure {} of {} for {}", call + 1, fail_times, key));
            }
            Ok(format!("{} ready", key))
        }
    })
}

/// Final state of one batch task
#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub id: String,
    pub priority: Priority,
    pub phase: LoadPhase,
    pub attempt: u32,
    pub error: Option<String>,
}

/// Everything `al simulate` reports
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub tier: NetworkTier,
    pub strategy: LoadingStrategy,
    pub tasks: Vec<TaskOutcome>,
    pub progress: f64,
    pub batch_ms: u64,
    pub prefetch: PassSummary,
    pub prefetch_stats: PrefetchStats,
    pub prefetch_ms: u64,
}

/// Run a batch, then a background prefetch pass, against fixed `signals`
pub async fn run(config: &Config, signals: ConnectivitySignals, bus: &EventBus) -> SimulationReport {
    debug!(?signals, "simulate::run: called");
    run_with_source(config, Arc::new(StaticSignals::new(signals)), bus).await
}

/// Run a batch, then a background prefetch pass, polling `source` throughout
pub async fn run_with_source(config: &Config, source: Arc<dyn SignalSource>, bus: &EventBus) -> SimulationReport {
    debug!("simulate::run_with_source: called");
    let entries = if config.prefetch.entries.is_empty() {
        default_entries()
    } else {
        config.prefetch.entries.clone()
    };

    let monitor = Arc::new(NetworkMonitor::new(source).with_events(bus));
    let tier = monitor.tier();
    let strategy = monitor.loading_strategy();
    info!(%tier, entries = entries.len(), "Starting simulation");

    let polling = CancellationToken::new();
    let poller = config
        .network
        .poll_interval()
        .map(|interval| monitor.spawn_polling(interval, polling.clone()));

    let started = Instant::now();
    let mut scheduler = BatchScheduler::new(Arc::clone(&monitor))
        .with_config(&config.loader)
        .with_events(bus);
    for entry in &entries {
        scheduler.push(entry.key.clone(), entry.priority, simulated_producer(entry));
    }
    let batch = scheduler.start();
    batch.wait_settled().await;
    let batch_ms = started.elapsed().as_millis() as u64;

    let tasks = batch
        .tasks()
        .iter()
        .map(|task| {
            let state = task.state();
            TaskOutcome {
                id: task.id().to_string(),
                priority: task.priority(),
                phase: state.phase,
                attempt: state.attempt,
                error: state.error.map(|e| e.to_string()),
            }
        })
        .collect();

    let mut registry = PrefetchRegistry::new();
    for entry in &entries {
        registry = registry.register(entry.key.clone(), entry.priority, simulated_producer(entry));
    }
    for (needle, key) in &config.prefetch.patterns {
        registry = registry.pattern(needle.clone(), key.clone());
    }
    let queue = PrefetchQueue::builder(registry)
        .config(&config.prefetch)
        .events(bus)
        .build(Arc::clone(&monitor));

    let started = Instant::now();
    let prefetch = queue.run_background_pass().await.unwrap_or_default();
    let prefetch_ms = started.elapsed().as_millis() as u64;

    polling.cancel();
    if let Some(handle) = poller {
        if let Err(e) = handle.await {
            warn!(error = %e, "Network polling task failed");
        }
    }

    SimulationReport {
        tier,
        strategy,
        tasks,
        progress: batch.progress(),
        batch_ms,
        prefetch,
        prefetch_stats: queue.stats(),
        prefetch_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::NetworkInfo;

    #[test]
    fn test_signals_for_tier_classify_back() {
        for tier in NetworkTier::ALL {
            assert_eq!(NetworkInfo::from_signals(&signals_for_tier(tier)).tier, tier);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_producer_fails_then_succeeds() {
        let produce = simulated_producer(&SimulatedEntry::new("/leasing", Priority::Medium, 100).failing(1));
        let err = produce().await.unwrap_err();
        assert!(err.to_string().contains("simulated failure 1 of 1 for /leasing"));
        assert_eq!(produce().await.unwrap(), "/leasing ready");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_on_good_network() {
        let bus = EventBus::new(1024);
        let report = run(&Config::default(), signals_for_tier(NetworkTier::Good), &bus).await;

        assert_eq!(report.tier, NetworkTier::Good);
        assert_eq!(report.tasks.len(), 5);
        assert_eq!(report.tasks[0].id, "/dashboard");
        // /leasing fails once, then succeeds on its first retry
        assert!(report.tasks.iter().all(|t| t.phase == LoadPhase::Loaded));
        assert_eq!(report.progress, 100.0);
        let leasing = report.tasks.iter().find(|t| t.id == "/leasing").unwrap();
        assert_eq!(leasing.attempt, 1);

        // Prefetch producers are fresh, so /leasing fails once there too
        assert_eq!(report.prefetch.loaded, 4);
        assert_eq!(report.prefetch.failed, 1);
        assert_eq!(report.prefetch_stats.error, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_sees_network_drop_before_prefetch() {
        let bus = EventBus::new(1024);
        let mut rx = bus.subscribe();
        let mut config = Config::default();
        config.network.poll_interval_ms = 100;
        let source = Arc::new(StaticSignals::new(signals_for_tier(NetworkTier::Good)));

        let flip = tokio::spawn({
            let source = Arc::clone(&source);
            async move {
                tokio::time::sleep(Duration::from_millis(150)).await;
                source.set_online(false);
            }
        });
        let report = run_with_source(&config, source, &bus).await;
        flip.await.unwrap();

        assert_eq!(report.tier, NetworkTier::Good);
        assert!(report.prefetch.stopped_early);
        assert_eq!(report.prefetch.loaded, 0);

        let mut changes = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let crate::events::LoadEvent::NetworkChanged { tier, online, .. } = event {
                changes.push((tier, online));
            }
        }
        assert_eq!(changes, vec![(NetworkTier::Offline, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_offline() {
        let bus = EventBus::new(1024);
        let report = run(&Config::default(), signals_for_tier(NetworkTier::Offline), &bus).await;

        assert_eq!(report.tier, NetworkTier::Offline);
        assert_eq!(report.tasks[0].phase, LoadPhase::Loaded);
        assert!(report.tasks[1..].iter().all(|t| t.phase == LoadPhase::Failed));
        assert_eq!(report.progress, 20.0);
        assert!(report.prefetch.stopped_early);
        assert_eq!(report.prefetch_stats.idle, 5);
    }
}

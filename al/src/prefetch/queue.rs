//! Prefetch queue - background warming and on-demand loading of registry entries

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::PrefetchConfig;
use super::registry::{PrefetchRegistry, PrefetchStatus};
use crate::domain::{DelayTable, PreloadDelay, Priority};
use crate::error::LoadError;
use crate::events::{EventBus, EventEmitter};
use crate::network::NetworkMonitor;

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T, LoadError>>>;

struct Slot<T> {
    status: PrefetchStatus,
    value: Option<T>,
    error: Option<LoadError>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            status: PrefetchStatus::Idle,
            value: None,
            error: None,
        }
    }
}

struct InFlight<T> {
    id: u64,
    load: SharedLoad<T>,
}

struct QueueState<T> {
    slots: HashMap<String, Slot<T>>,
    /// One running load per key, shared by the background and immediate paths
    in_flight: HashMap<String, InFlight<T>>,
    next_load_id: u64,
}

enum Claim<T> {
    Cached(T),
    Await(u64, SharedLoad<T>),
}

/// Counts of entries per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchStats {
    pub idle: usize,
    pub loading: usize,
    pub loaded: usize,
    pub error: usize,
}

impl PrefetchStats {
    pub fn total(&self) -> usize {
        self.idle + self.loading + self.loaded + self.error
    }
}

/// Outcome of one background pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub loaded: usize,
    pub failed: usize,
    /// Preload was disabled or the queue was cancelled before the queue drained
    pub stopped_early: bool,
}

/// Clears the pass flag when the pass ends, however it ends
struct PassGuard {
    running: Arc<AtomicBool>,
}

impl PassGuard {
    fn acquire(running: &Arc<AtomicBool>) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                running: Arc::clone(running),
            })
    }
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Builder for [`PrefetchQueue`]
pub struct PrefetchQueueBuilder<T> {
    registry: PrefetchRegistry<T>,
    config: PrefetchConfig,
    token: Option<CancellationToken>,
    emitter: Option<EventEmitter>,
}

impl<T: Clone + Send + Sync + 'static> PrefetchQueueBuilder<T> {
    pub fn config(mut self, config: &PrefetchConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn events(mut self, bus: &EventBus) -> Self {
        self.emitter = Some(bus.emitter_for("prefetch-queue"));
        self
    }

    pub fn build(self, monitor: Arc<NetworkMonitor>) -> PrefetchQueue<T> {
        debug!(entries = self.registry.len(), "PrefetchQueueBuilder::build: called");
        let slots = self
            .registry
            .keys()
            .map(|key| (key.to_string(), Slot::default()))
            .collect();
        PrefetchQueue {
            inner: Arc::new(QueueInner {
                registry: self.registry,
                monitor,
                idle_delay: self.config.idle_delay(),
                item_pause: self.config.item_pause(),
                state: Mutex::new(QueueState {
                    slots,
                    in_flight: HashMap::new(),
                    next_load_id: 0,
                }),
                token: self.token.unwrap_or_else(CancellationToken::new),
                pass_running: Arc::new(AtomicBool::new(false)),
                emitter: self.emitter,
            }),
        }
    }
}

/// Warms registry entries during idle time and serves them on demand
///
/// Loaded values are cached for the lifetime of the queue. Errored entries
/// are retried by the next background pass or immediate call. Cloning yields
/// another handle to the same queue.
pub struct PrefetchQueue<T> {
    inner: Arc<QueueInner<T>>,
}

impl<T> Clone for PrefetchQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> PrefetchQueue<T> {
    pub fn builder(registry: PrefetchRegistry<T>) -> PrefetchQueueBuilder<T> {
        PrefetchQueueBuilder {
            registry,
            config: PrefetchConfig::default(),
            token: None,
            emitter: None,
        }
    }

    pub fn new(registry: PrefetchRegistry<T>, monitor: Arc<NetworkMonitor>) -> Self {
        Self::builder(registry).build(monitor)
    }

    /// Spawn a background pass; false if one is already running or the queue is cancelled
    pub fn start_background_preload(&self) -> bool {
        if self.inner.token.is_cancelled() {
            debug!("PrefetchQueue::start_background_preload: cancelled, ignoring");
            return false;
        }
        let Some(guard) = PassGuard::acquire(&self.inner.pass_running) else {
            debug!("PrefetchQueue::start_background_preload: pass already running");
            return false;
        };
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let _guard = guard;
            inner.run_pass().await;
        });
        true
    }

    /// Run a background pass in the calling task
    ///
    /// Returns `None` if another pass is already running.
    pub async fn run_background_pass(&self) -> Option<PassSummary> {
        let _guard = PassGuard::acquire(&self.inner.pass_running)?;
        Some(self.inner.run_pass().await)
    }

    pub fn is_pass_running(&self) -> bool {
        self.inner.pass_running.load(Ordering::SeqCst)
    }

    /// Load the entry `path` resolves to, or return its cached value
    pub async fn preload_immediate(&self, path: &str) -> Result<T, LoadError> {
        debug!(%path, "PrefetchQueue::preload_immediate: called");
        let Some(key) = self.inner.registry.resolve(path) else {
            warn!(%path, "No prefetch entry matches path");
            return Err(LoadError::Unresolved { path: path.to_string() });
        };
        self.inner.load(key).await
    }

    /// Whether the entry `path` resolves to has loaded
    pub fn is_preloaded(&self, path: &str) -> bool {
        self.status(path) == Some(PrefetchStatus::Loaded)
    }

    /// Status of the entry `path` resolves to
    pub fn status(&self, path: &str) -> Option<PrefetchStatus> {
        let key = self.inner.registry.resolve(path)?;
        let state = self.inner.state.lock();
        Some(state.slots.get(key).map(|s| s.status).unwrap_or_default())
    }

    /// Cached value of the entry `path` resolves to
    pub fn value(&self, path: &str) -> Option<T> {
        let key = self.inner.registry.resolve(path)?;
        self.inner.state.lock().slots.get(key).and_then(|s| s.value.clone())
    }

    /// Last error of the entry `path` resolves to, if it is in the error state
    pub fn error(&self, path: &str) -> Option<LoadError> {
        let key = self.inner.registry.resolve(path)?;
        self.inner.state.lock().slots.get(key).and_then(|s| s.error.clone())
    }

    pub fn stats(&self) -> PrefetchStats {
        let state = self.inner.state.lock();
        let mut stats = PrefetchStats::default();
        for slot in state.slots.values() {
            match slot.status {
                PrefetchStatus::Idle => stats.idle += 1,
                PrefetchStatus::Loading => stats.loading += 1,
                PrefetchStatus::Loaded => stats.loaded += 1,
                PrefetchStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    /// Stop any running pass and refuse new ones
    pub fn cancel(&self) {
        debug!("PrefetchQueue::cancel: called");
        self.inner.token.cancel();
    }
}

struct QueueInner<T> {
    registry: PrefetchRegistry<T>,
    monitor: Arc<NetworkMonitor>,
    idle_delay: Duration,
    item_pause: Duration,
    state: Mutex<QueueState<T>>,
    token: CancellationToken,
    pass_running: Arc<AtomicBool>,
    emitter: Option<EventEmitter>,
}

impl<T: Clone + Send + Sync + 'static> QueueInner<T> {
    /// Pending keys, most urgent first, registration order within a priority
    fn pending(&self) -> Vec<(String, Priority)> {
        let state = self.state.lock();
        let mut pending: Vec<(String, Priority)> = self
            .registry
            .definitions()
            .iter()
            .filter(|d| state.slots.get(&d.key).is_none_or(|s| s.status.is_pending()))
            .map(|d| (d.key.clone(), d.priority))
            .collect();
        pending.sort_by_key(|(_, priority)| *priority);
        pending
    }

    fn is_loaded(&self, key: &str) -> bool {
        self.state
            .lock()
            .slots
            .get(key)
            .is_some_and(|s| s.status == PrefetchStatus::Loaded)
    }

    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => !self.token.is_cancelled(),
        }
    }

    async fn run_pass(self: &Arc<Self>) -> PassSummary {
        let mut summary = PassSummary::default();

        // Let whatever is already scheduled run first
        tokio::task::yield_now().await;
        if !self.pause(self.idle_delay).await {
            summary.stopped_early = true;
            return summary;
        }

        let pending = self.pending();
        info!(pending = pending.len(), tier = %self.monitor.tier(), "Starting background prefetch pass");

        for (key, priority) in pending {
            if !self.monitor.loading_strategy().preload_enabled {
                info!(tier = %self.monitor.tier(), "Preload disabled for tier, stopping pass");
                summary.stopped_early = true;
                break;
            }
            if self.is_loaded(&key) {
                debug!(%key, "QueueInner::run_pass: already loaded, skipping");
                continue;
            }

            let delay = match DelayTable::lookup(priority, self.monitor.tier()) {
                PreloadDelay::Wait(delay) => delay,
                PreloadDelay::Unavailable => {
                    summary.stopped_early = true;
                    break;
                }
            };
            if !self.pause(delay).await {
                summary.stopped_early = true;
                break;
            }

            match self.load(&key).await {
                Ok(_) => summary.loaded += 1,
                Err(e) => {
                    warn!(%key, error = %e, "Background prefetch failed");
                    summary.failed += 1;
                }
            }

            if !self.pause(self.item_pause).await {
                summary.stopped_early = true;
                break;
            }
        }

        info!(
            loaded = summary.loaded,
            failed = summary.failed,
            stopped_early = summary.stopped_early,
            "Background prefetch pass finished"
        );
        summary
    }

    /// Load `key`, joining an in-flight load if there is one
    async fn load(self: &Arc<Self>, key: &str) -> Result<T, LoadError> {
        let (id, load) = match self.claim(key)? {
            Claim::Cached(value) => return Ok(value),
            Claim::Await(id, load) => (id, load),
        };
        let result = load.await;
        self.settle(key, id, &result);
        result
    }

    fn claim(self: &Arc<Self>, key: &str) -> Result<Claim<T>, LoadError> {
        let definition = self.registry.get(key).ok_or_else(|| LoadError::Unresolved { path: key.to_string() })?;

        let (id, load) = {
            let mut state = self.state.lock();
            if let Some(value) = state
                .slots
                .get(key)
                .filter(|s| s.status == PrefetchStatus::Loaded)
                .and_then(|s| s.value.clone())
            {
                debug!(%key, "QueueInner::claim: cached");
                return Ok(Claim::Cached(value));
            }
            if let Some(in_flight) = state.in_flight.get(key) {
                debug!(%key, id = in_flight.id, "QueueInner::claim: joining in-flight load");
                return Ok(Claim::Await(in_flight.id, in_flight.load.clone()));
            }

            state.next_load_id += 1;
            let id = state.next_load_id;
            // The producer runs on first poll, outside the lock
            let producer = definition.producer.clone();
            let load = async move { producer().await.map_err(|e| LoadError::from_report(&e)) }
                .boxed()
                .shared();
            state.in_flight.insert(
                key.to_string(),
                InFlight {
                    id,
                    load: load.clone(),
                },
            );
            let slot = state.slots.entry(key.to_string()).or_default();
            slot.status = PrefetchStatus::Loading;
            slot.error = None;
            (id, load)
        };

        debug!(%key, id, "QueueInner::claim: started load");
        self.emit(key, PrefetchStatus::Loading);

        // Settle even if every caller drops its future before the load finishes
        let inner = Arc::clone(self);
        let driver = load.clone();
        let owned_key = key.to_string();
        tokio::spawn(async move {
            let result = driver.await;
            inner.settle(&owned_key, id, &result);
        });

        Ok(Claim::Await(id, load))
    }

    /// Record the result of load `id`; later settlers of the same load are no-ops
    fn settle(&self, key: &str, id: u64, result: &Result<T, LoadError>) {
        let status = {
            let mut state = self.state.lock();
            if state.in_flight.get(key).is_none_or(|f| f.id != id) {
                return;
            }
            state.in_flight.remove(key);
            let slot = state.slots.entry(key.to_string()).or_default();
            match result {
                Ok(value) => {
                    slot.status = PrefetchStatus::Loaded;
                    slot.value = Some(value.clone());
                    slot.error = None;
                }
                Err(error) => {
                    slot.status = PrefetchStatus::Error;
                    slot.error = Some(error.clone());
                }
            }
            slot.status
        };
        debug!(%key, id, %status, "QueueInner::settle: called");
        self.emit(key, status);
    }

    fn emit(&self, key: &str, status: PrefetchStatus) {
        if let Some(emitter) = &self.emitter {
            emitter.prefetch_status(key, status);
        }
    }
}

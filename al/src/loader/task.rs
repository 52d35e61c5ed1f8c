//! Priority load task

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::LoaderConfig;
use super::producer::Producer;
use super::state::{LoadPhase, LoadState};
use crate::domain::{DelayTable, PreloadDelay, Priority};
use crate::error::LoadError;
use crate::events::{EventBus, EventEmitter};
use crate::network::NetworkMonitor;

type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(&LoadError) + Send + Sync>;

/// Per-task tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Overrides the active strategy's retry count
    pub retry_count: Option<u32>,

    /// Added on top of the table delay (batch stagger)
    pub extra_delay: Duration,

    pub backoff_base: Duration,

    /// Wrap each producer call in the strategy's timeout hint
    pub enforce_timeout: bool,
}

impl From<&LoaderConfig> for LoadOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            extra_delay: Duration::ZERO,
            backoff_base: config.backoff_base(),
            enforce_timeout: config.enforce_timeout,
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from(&LoaderConfig::default())
    }
}

/// Builder for [`PriorityLoadTask`]
pub struct LoadTaskBuilder<T> {
    id: String,
    priority: Priority,
    producer: Producer<T>,
    options: LoadOptions,
    token: Option<CancellationToken>,
    emitter: Option<EventEmitter>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T: Clone + Send + Sync + 'static> LoadTaskBuilder<T> {
    pub fn options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.options.retry_count = Some(retry_count);
        self
    }

    pub fn extra_delay(mut self, extra_delay: Duration) -> Self {
        self.options.extra_delay = extra_delay;
        self
    }

    /// Use a consumer-owned token; cancelling it makes the task inert
    pub fn token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn events(mut self, bus: &EventBus) -> Self {
        self.emitter = Some(bus.emitter_for(self.id.clone()));
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&LoadError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }

    pub fn build(self, monitor: Arc<NetworkMonitor>) -> PriorityLoadTask<T> {
        debug!(id = %self.id, priority = %self.priority, options = ?self.options, "LoadTaskBuilder::build: called");
        let (state, _) = watch::channel(LoadState::default());
        PriorityLoadTask {
            inner: Arc::new(TaskInner {
                id: self.id,
                priority: self.priority,
                producer: self.producer,
                monitor,
                options: self.options,
                state,
                token: self.token.unwrap_or_else(CancellationToken::new),
                generation: AtomicU64::new(0),
                launched: AtomicBool::new(false),
                emitter: self.emitter,
                on_success: self.on_success,
                on_error: self.on_error,
            }),
        }
    }
}

/// A tracked asynchronous unit of work with a priority
///
/// Cloning yields another handle to the same task.
pub struct PriorityLoadTask<T> {
    inner: Arc<TaskInner<T>>,
}

impl<T> Clone for PriorityLoadTask<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> PriorityLoadTask<T> {
    pub fn builder(id: impl Into<String>, priority: Priority, producer: Producer<T>) -> LoadTaskBuilder<T> {
        LoadTaskBuilder {
            id: id.into(),
            priority,
            producer,
            options: LoadOptions::default(),
            token: None,
            emitter: None,
            on_success: None,
            on_error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn priority(&self) -> Priority {
        self.inner.priority
    }

    /// Snapshot of the current state
    pub fn state(&self) -> LoadState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn phase(&self) -> LoadPhase {
        self.inner.state.borrow().phase
    }

    /// Receiver that observes every state change
    pub fn watch(&self) -> watch::Receiver<LoadState<T>> {
        self.inner.state.subscribe()
    }

    pub fn token(&self) -> CancellationToken {
        self.inner.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Begin loading if the task is idle and not cancelled
    ///
    /// When the resolved delay is zero the producer is invoked before this
    /// returns. Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        if self.is_cancelled() {
            debug!(id = %self.inner.id, "PriorityLoadTask::start: cancelled, ignoring");
            return false;
        }
        if self
            .inner
            .launched
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(id = %self.inner.id, phase = %self.phase(), "PriorityLoadTask::start: already started");
            return false;
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.begin(generation);
        true
    }

    /// Reset attempt and phase, then start over
    pub fn retry(&self) -> bool {
        if self.is_cancelled() {
            debug!(id = %self.inner.id, "PriorityLoadTask::retry: cancelled, ignoring");
            return false;
        }
        info!(id = %self.inner.id, "Manual retry");
        // Invalidate any in-flight run before resetting
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(|s| s.reset());
        self.inner.launched.store(false, Ordering::SeqCst);
        self.start()
    }

    /// Clear the "still interested" flag; no state changes after this
    pub fn cancel(&self) {
        debug!(id = %self.inner.id, "PriorityLoadTask::cancel: called");
        self.inner.token.cancel();
    }

    /// Wait until the task is loaded or failed
    ///
    /// Returns the current state early if the task is cancelled. A task that
    /// is never started never settles.
    pub async fn wait_settled(&self) -> LoadState<T> {
        let mut rx = self.inner.state.subscribe();
        let settled = tokio::select! {
            _ = self.inner.token.cancelled() => None,
            result = rx.wait_for(|s| s.phase.is_settled()) => result.ok().map(|s| (*s).clone()),
        };
        settled.unwrap_or_else(|| self.state())
    }
}

struct TaskInner<T> {
    id: String,
    priority: Priority,
    producer: Producer<T>,
    monitor: Arc<NetworkMonitor>,
    options: LoadOptions,
    state: watch::Sender<LoadState<T>>,
    token: CancellationToken,
    /// Bumped on every start/retry; writes from older runs are dropped
    generation: AtomicU64,
    /// Set by the one `start` that wins; cleared by `retry`
    launched: AtomicBool,
    emitter: Option<EventEmitter>,
    on_success: Option<SuccessCallback<T>>,
    on_error: Option<ErrorCallback>,
}

impl<T: Clone + Send + Sync + 'static> TaskInner<T> {
    fn is_current(&self, generation: u64) -> bool {
        !self.token.is_cancelled() && self.generation.load(Ordering::SeqCst) == generation
    }

    fn apply(&self, f: impl FnOnce(&mut LoadState<T>)) {
        let mut transition = None;
        self.state.send_modify(|state| {
            let before = state.phase;
            f(state);
            if state.phase != before {
                transition = Some((state.phase, state.attempt));
            }
        });
        if let Some((phase, attempt)) = transition {
            debug!(id = %self.id, %phase, attempt, "PriorityLoadTask: phase changed");
            if let Some(emitter) = &self.emitter {
                emitter.phase_changed(phase, attempt);
            }
        }
    }

    /// Apply a state change only if this run is still wanted
    fn update(&self, generation: u64, f: impl FnOnce(&mut LoadState<T>)) -> bool {
        if !self.is_current(generation) {
            debug!(id = %self.id, generation, "PriorityLoadTask: stale update suppressed");
            return false;
        }
        self.apply(f);
        true
    }

    fn begin(self: &Arc<Self>, generation: u64) {
        let tier = self.monitor.tier();
        debug!(id = %self.id, priority = %self.priority, %tier, generation, "PriorityLoadTask::begin: called");

        let delay = match DelayTable::lookup(self.priority, tier) {
            PreloadDelay::Unavailable => {
                self.fail(
                    generation,
                    LoadError::NetworkUnavailable {
                        priority: self.priority,
                    },
                );
                return;
            }
            PreloadDelay::Wait(table_delay) => table_delay + self.options.extra_delay,
        };

        if !self.update(generation, |s| s.phase = LoadPhase::Delaying) {
            return;
        }

        if delay.is_zero() {
            if let Some(load) = self.invoke(generation) {
                tokio::spawn(Arc::clone(self).run_attempts(generation, load));
            }
            return;
        }

        if let Some(emitter) = &self.emitter {
            emitter.delay_started(delay);
        }
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if !inner.pause(generation, delay).await {
                return;
            }
            if let Some(load) = inner.invoke(generation) {
                inner.run_attempts(generation, load).await;
            }
        });
    }

    /// Sleep, then report whether this run is still wanted
    async fn pause(&self, generation: u64, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(duration) => self.is_current(generation),
        }
    }

    fn invoke(&self, generation: u64) -> Option<BoxFuture<'static, eyre::Result<T>>> {
        if !self.update(generation, |s| s.phase = LoadPhase::Loading) {
            return None;
        }
        let attempt = self.state.borrow().attempt;
        debug!(id = %self.id, attempt, "PriorityLoadTask: invoking producer");
        if let Some(emitter) = &self.emitter {
            emitter.producer_invoked(attempt);
        }
        Some((self.producer)())
    }

    async fn run_attempts(self: Arc<Self>, generation: u64, mut load: BoxFuture<'static, eyre::Result<T>>) {
        loop {
            let Some(result) = self.await_load(load).await else {
                debug!(id = %self.id, "PriorityLoadTask: cancelled while loading");
                return;
            };

            let error = match result {
                Ok(value) => {
                    let loaded = value.clone();
                    if self.update(generation, move |s| s.mark_loaded(loaded)) {
                        info!(id = %self.id, "Load complete");
                        if let Some(callback) = &self.on_success {
                            callback(&value);
                        }
                    }
                    return;
                }
                Err(error) => error,
            };

            let attempt = self.state.borrow().attempt;
            let retry_count = self
                .options
                .retry_count
                .unwrap_or_else(|| self.monitor.loading_strategy().retry_count);
            if !error.is_retryable() || attempt >= retry_count {
                self.fail(generation, error);
                return;
            }

            let next = attempt + 1;
            let backoff = self.options.backoff_base * next;
            warn!(id = %self.id, attempt = next, ?backoff, error = %error, "Load attempt failed, retrying");
            if !self.update(generation, |s| s.attempt = next) {
                return;
            }
            if let Some(emitter) = &self.emitter {
                emitter.retry_scheduled(next, backoff);
            }
            if !self.pause(generation, backoff).await {
                return;
            }
            match self.invoke(generation) {
                Some(next_load) => load = next_load,
                None => return,
            }
        }
    }

    /// Drive one producer future; `None` if cancelled meanwhile
    async fn await_load(&self, load: BoxFuture<'static, eyre::Result<T>>) -> Option<Result<T, LoadError>> {
        let timeout = if self.options.enforce_timeout {
            let hint = self.monitor.loading_strategy().timeout_hint;
            (!hint.is_zero()).then_some(hint)
        } else {
            None
        };

        let attempt = async move {
            match timeout {
                Some(after) => match tokio::time::timeout(after, load).await {
                    Ok(result) => result.map_err(|e| LoadError::from_report(&e)),
                    Err(_) => Err(LoadError::Timeout { after }),
                },
                None => load.await.map_err(|e| LoadError::from_report(&e)),
            }
        };

        tokio::select! {
            _ = self.token.cancelled() => None,
            result = attempt => Some(result),
        }
    }

    fn fail(&self, generation: u64, error: LoadError) {
        let recorded = error.clone();
        if self.update(generation, move |s| s.mark_failed(recorded)) {
            warn!(id = %self.id, kind = error.kind(), error = %error, "Load failed");
            if let Some(callback) = &self.on_error {
                callback(&error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LoadEvent;
    use crate::loader::producer;
    use crate::network::{ConnectivitySignals, StaticSignals};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::broadcast;
    use tokio::time::Instant;

    fn monitor(signals: ConnectivitySignals) -> (Arc<StaticSignals>, Arc<NetworkMonitor>) {
        let source = Arc::new(StaticSignals::new(signals));
        let monitor = Arc::new(NetworkMonitor::new(source.clone()));
        (source, monitor)
    }

    fn poor() -> ConnectivitySignals {
        ConnectivitySignals::rich("2g", 0.2, 1500, false)
    }

    fn counting_ok(calls: Arc<AtomicUsize>) -> Producer<&'static str> {
        producer(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("ready") }
        })
    }

    /// Fails `failures` times, then succeeds
    fn flaky(failures: usize, calls: Arc<AtomicUsize>) -> Producer<&'static str> {
        producer(move || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < failures {
                    Err(eyre::eyre!("attempt {} refused", n))
                } else {
                    Ok("ready")
                }
            }
        })
    }

    fn drain(rx: &mut broadcast::Receiver<LoadEvent>) -> Vec<LoadEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn phases(events: &[LoadEvent]) -> Vec<LoadPhase> {
        events
            .iter()
            .filter_map(|e| match e {
                LoadEvent::PhaseChanged { phase, .. } => Some(*phase),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_priority_on_poor_waits_table_delay() {
        let (_source, monitor) = monitor(poor());
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("chart", Priority::High, counting_ok(calls.clone())).build(monitor);

        let started = Instant::now();
        assert!(task.start());
        assert_eq!(task.phase(), LoadPhase::Delaying);

        tokio::time::sleep(Duration::from_millis(199)).await;
        assert_eq!(task.phase(), LoadPhase::Delaying);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let state = task.wait_settled().await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(210));
        assert!(state.is_loaded());
        assert_eq!(state.value, Some("ready"));
        assert_eq!(state.progress, 100);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offline_non_critical_fails_fast() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let error_count = errors.clone();
        let task = PriorityLoadTask::builder("reports", Priority::Medium, counting_ok(calls.clone()))
            .on_error(move |_| {
                error_count.fetch_add(1, Ordering::SeqCst);
            })
            .build(monitor);

        task.start();

        let state = task.state();
        assert_eq!(state.phase, LoadPhase::Failed);
        assert_eq!(
            state.error,
            Some(LoadError::NetworkUnavailable {
                priority: Priority::Medium
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offline_critical_invokes_producer_synchronously() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(false));
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("shell", Priority::Critical, counting_ok(calls.clone())).build(monitor);

        task.start();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(task.phase(), LoadPhase::Loading);
        assert!(task.wait_settled().await.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_linear_backoff_then_succeeds() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("portfolio", Priority::Medium, flaky(2, calls.clone()))
            .events(&bus)
            .build(monitor);

        let started = Instant::now();
        task.start();
        let state = task.wait_settled().await;

        assert!(state.is_loaded());
        assert!(state.error.is_none());
        assert_eq!(state.attempt, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 200ms table delay (medium, good) + 1s + 2s backoff
        assert!(started.elapsed() >= Duration::from_millis(3200));

        let events = drain(&mut rx);
        let backoffs: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                LoadEvent::RetryScheduled { backoff_ms, .. } => Some(*backoff_ms),
                _ => None,
            })
            .collect();
        assert_eq!(backoffs, vec![1000, 2000]);
        assert_eq!(
            phases(&events),
            vec![LoadPhase::Delaying, LoadPhase::Loading, LoadPhase::Loaded]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_terminally() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("leasing", Priority::High, flaky(usize::MAX, calls.clone()))
            .retry_count(1)
            .build(monitor);

        task.start();
        let state = task.wait_settled().await;

        assert!(state.is_failed());
        assert_eq!(state.attempt, 1);
        assert!(matches!(state.error, Some(LoadError::LoadFailure { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_retry_resets_attempt() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("credit", Priority::High, flaky(1, calls.clone()))
            .retry_count(0)
            .events(&bus)
            .build(monitor);

        task.start();
        assert!(task.wait_settled().await.is_failed());

        assert!(task.retry());
        let after_retry = task.state();
        assert_eq!(after_retry.attempt, 0);
        assert_eq!(after_retry.phase, LoadPhase::Delaying);

        let state = task.wait_settled().await;
        assert!(state.is_loaded());

        assert_eq!(
            phases(&drain(&mut rx)),
            vec![
                LoadPhase::Delaying,
                LoadPhase::Loading,
                LoadPhase::Failed,
                LoadPhase::Idle,
                LoadPhase::Delaying,
                LoadPhase::Loading,
                LoadPhase::Loaded,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_delay_is_silent() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let successes = Arc::new(AtomicUsize::new(0));
        let success_count = successes.clone();
        let token = CancellationToken::new();
        let task = PriorityLoadTask::builder("lazy-widget", Priority::Lazy, counting_ok(calls.clone()))
            .token(token.clone())
            .on_success(move |_| {
                success_count.fetch_add(1, Ordering::SeqCst);
            })
            .build(monitor);

        task.start();
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(successes.load(Ordering::SeqCst), 0);
        assert_eq!(task.phase(), LoadPhase::Delaying);
        assert!(!task.retry());
        assert!(!task.start());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retries() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("statements", Priority::Critical, flaky(usize::MAX, calls.clone()))
            .build(monitor);

        task.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(task.state().attempt, 1);
        task.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(task.state().attempt, 1);
        assert_eq!(task.phase(), LoadPhase::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_enforced_timeout() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let hanging: Producer<u32> = producer(|| futures::future::pending());
        let options = LoadOptions {
            retry_count: Some(0),
            enforce_timeout: true,
            ..LoadOptions::default()
        };
        let task = PriorityLoadTask::builder("hanging", Priority::Critical, hanging)
            .options(options)
            .build(monitor);

        task.start();
        let state = task.wait_settled().await;
        assert_eq!(
            state.error,
            Some(LoadError::Timeout {
                after: Duration::from_secs(15)
            })
        );
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("once", Priority::Critical, counting_ok(calls.clone())).build(monitor);

        assert!(task.start());
        assert!(!task.start());
        task.wait_settled().await;
        assert!(!task.start());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_invokes_producer_once() {
        let (_source, monitor) = monitor(ConnectivitySignals::online_only(true));
        let calls = Arc::new(AtomicUsize::new(0));
        let task = PriorityLoadTask::builder("race", Priority::Critical, counting_ok(calls.clone())).build(monitor);
        let barrier = Arc::new(tokio::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let task = task.clone();
                let barrier = Arc::clone(&barrier);
                tokio::spawn(async move {
                    barrier.wait().await;
                    task.start()
                })
            })
            .collect();
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(task.wait_settled().await.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

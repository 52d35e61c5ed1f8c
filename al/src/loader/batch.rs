//! Batch scheduling of priority load tasks
//!
//! Critical tasks start immediately and together. Every other task starts
//! after its table delay plus `index * stagger`, where `index` is its position
//! among the non-critical tasks once sorted by priority.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::config::LoaderConfig;
use super::producer::Producer;
use super::state::LoadState;
use super::task::{LoadOptions, PriorityLoadTask};
use crate::domain::Priority;
use crate::events::EventBus;
use crate::network::NetworkMonitor;

struct BatchEntry<T> {
    id: String,
    priority: Priority,
    producer: Producer<T>,
}

/// Collects producers, then issues them as a [`Batch`]
pub struct BatchScheduler<T> {
    monitor: Arc<NetworkMonitor>,
    options: LoadOptions,
    stagger: Duration,
    events: Option<EventBus>,
    token: CancellationToken,
    entries: Vec<BatchEntry<T>>,
}

impl<T: Clone + Send + Sync + 'static> BatchScheduler<T> {
    pub fn new(monitor: Arc<NetworkMonitor>) -> Self {
        let config = LoaderConfig::default();
        Self {
            monitor,
            options: LoadOptions::from(&config),
            stagger: config.stagger(),
            events: None,
            token: CancellationToken::new(),
            entries: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: &LoaderConfig) -> Self {
        self.options = LoadOptions::from(config);
        self.stagger = config.stagger();
        self
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }

    pub fn with_events(mut self, bus: &EventBus) -> Self {
        self.events = Some(bus.clone());
        self
    }

    /// Parent token; each task gets a child, so cancelling this cancels all
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn add(mut self, id: impl Into<String>, priority: Priority, producer: Producer<T>) -> Self {
        self.push(id, priority, producer);
        self
    }

    pub fn push(&mut self, id: impl Into<String>, priority: Priority, producer: Producer<T>) {
        let id = id.into();
        debug!(%id, %priority, "BatchScheduler::push: called");
        self.entries.push(BatchEntry { id, priority, producer });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort by priority and issue every task
    pub fn start(self) -> Batch<T> {
        let Self {
            monitor,
            options,
            stagger,
            events,
            token,
            mut entries,
        } = self;

        // Stable: insertion order is kept within a priority
        entries.sort_by_key(|e| e.priority);
        let (critical, deferred): (Vec<_>, Vec<_>) = entries.into_iter().partition(|e| e.priority.is_critical());

        info!(
            critical = critical.len(),
            deferred = deferred.len(),
            tier = %monitor.tier(),
            "Starting batch"
        );

        let build = |entry: BatchEntry<T>, extra_delay: Duration| {
            let mut builder = PriorityLoadTask::builder(entry.id, entry.priority, entry.producer)
                .options(options.clone())
                .extra_delay(extra_delay)
                .token(token.child_token());
            if let Some(bus) = &events {
                builder = builder.events(bus);
            }
            builder.build(Arc::clone(&monitor))
        };

        let mut tasks = Vec::with_capacity(critical.len() + deferred.len());
        for entry in critical {
            let task = build(entry, Duration::ZERO);
            task.start();
            tasks.push(task);
        }
        for (index, entry) in deferred.into_iter().enumerate() {
            let task = build(entry, stagger * index as u32);
            task.start();
            tasks.push(task);
        }

        Batch { tasks, token }
    }
}

/// A running set of load tasks, in issuance order
pub struct Batch<T> {
    tasks: Vec<PriorityLoadTask<T>>,
    token: CancellationToken,
}

impl<T: Clone + Send + Sync + 'static> Batch<T> {
    pub fn tasks(&self) -> &[PriorityLoadTask<T>] {
        &self.tasks
    }

    pub fn task(&self, id: &str) -> Option<&PriorityLoadTask<T>> {
        self.tasks.iter().find(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task id → state, in issuance order
    pub fn states(&self) -> Vec<(String, LoadState<T>)> {
        self.tasks.iter().map(|t| (t.id().to_string(), t.state())).collect()
    }

    pub fn is_all_loaded(&self) -> bool {
        self.tasks.iter().all(|t| t.state().is_loaded())
    }

    pub fn is_any_loading(&self) -> bool {
        self.tasks.iter().any(|t| t.state().is_loading())
    }

    pub fn loaded_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state().is_loaded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.state().is_failed()).count()
    }

    /// Percentage of tasks loaded; 0 for an empty batch
    pub fn progress(&self) -> f64 {
        if self.tasks.is_empty() {
            return 0.0;
        }
        self.loaded_count() as f64 * 100.0 / self.tasks.len() as f64
    }

    /// Wait until every task is loaded or failed
    pub async fn wait_settled(&self) -> Vec<LoadState<T>> {
        join_all(self.tasks.iter().map(|t| t.wait_settled())).await
    }

    /// Manually retry only the failed tasks; returns how many restarted
    pub fn retry_failed(&self) -> usize {
        let restarted = self
            .tasks
            .iter()
            .filter(|t| t.state().is_failed())
            .filter(|t| t.retry())
            .count();
        debug!(restarted, "Batch::retry_failed: called");
        restarted
    }

    /// Cancel every task in the batch
    pub fn cancel(&self) {
        debug!(tasks = self.tasks.len(), "Batch::cancel: called");
        self.token.cancel();
    }
}

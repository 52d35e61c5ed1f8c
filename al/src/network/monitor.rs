//! Network quality monitor with change-only notification

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::info::NetworkInfo;
use super::source::SignalSource;
use super::strategy::LoadingStrategy;
use crate::domain::NetworkTier;
use crate::events::{EventBus, EventEmitter};

type NetworkCallback = Arc<dyn Fn(&NetworkInfo) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    callbacks: BTreeMap<u64, NetworkCallback>,
}

/// Owns the current [`NetworkInfo`] and is its only writer
///
/// Construct once at startup and share through an `Arc`.
pub struct NetworkMonitor {
    source: Arc<dyn SignalSource>,
    current: Mutex<NetworkInfo>,
    observers: Arc<Mutex<Observers>>,
    emitter: Option<EventEmitter>,
}

impl NetworkMonitor {
    /// Create a monitor and take an initial reading
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        let initial = NetworkInfo::from_signals(&source.sample());
        debug!(?initial, "NetworkMonitor::new: called");
        Self {
            source,
            current: Mutex::new(initial),
            observers: Arc::new(Mutex::new(Observers::default())),
            emitter: None,
        }
    }

    /// Publish tier changes on the event bus as well
    pub fn with_events(mut self, bus: &EventBus) -> Self {
        self.emitter = Some(bus.emitter_for("network-monitor"));
        self
    }

    /// Derive a fresh snapshot from the signal source without storing it
    pub fn detect(&self) -> NetworkInfo {
        NetworkInfo::from_signals(&self.source.sample())
    }

    /// Last stored snapshot
    pub fn current(&self) -> NetworkInfo {
        self.current.lock().clone()
    }

    pub fn tier(&self) -> NetworkTier {
        self.current.lock().tier
    }

    pub fn is_online(&self) -> bool {
        self.current.lock().online
    }

    /// Strategy for the current tier
    pub fn loading_strategy(&self) -> LoadingStrategy {
        LoadingStrategy::for_tier(self.tier())
    }

    /// Register an observer, called only when tier or online state changes
    ///
    /// The observer stays registered while the returned handle is alive.
    #[must_use = "dropping the Subscription unsubscribes immediately"]
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&NetworkInfo) + Send + Sync + 'static,
    {
        let mut observers = self.observers.lock();
        let id = observers.next_id;
        observers.next_id += 1;
        observers.callbacks.insert(id, Arc::new(callback));
        debug!(id, count = observers.callbacks.len(), "NetworkMonitor::subscribe: registered");
        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().callbacks.len()
    }

    /// Re-sample the signals and notify observers if the tier or online flag moved
    ///
    /// Returns true when observers were notified.
    pub fn refresh(&self) -> bool {
        let next = self.detect();
        let changed = {
            let mut current = self.current.lock();
            let changed = next.differs_from(&current);
            *current = next.clone();
            changed
        };

        if !changed {
            return false;
        }

        info!(tier = %next.tier, online = next.online, "Network quality changed");
        if let Some(emitter) = &self.emitter {
            emitter.network_changed(next.tier, next.online);
        }

        // Observers may call back into the monitor; invoke them unlocked
        let callbacks: Vec<NetworkCallback> = self.observers.lock().callbacks.values().cloned().collect();
        for callback in callbacks {
            callback(&next);
        }
        true
    }

    /// Poll the signal source on an interval until `token` is cancelled
    pub fn spawn_polling(
        self: &Arc<Self>,
        interval: Duration,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        debug!(?interval, "NetworkMonitor::spawn_polling: called");
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("NetworkMonitor: polling stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        monitor.refresh();
                    }
                }
            }
        })
    }
}

/// Handle for a registered observer; unsubscribes on drop
pub struct Subscription {
    id: u64,
    observers: Weak<Mutex<Observers>>,
}

impl Subscription {
    /// Remove the observer now
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.lock().callbacks.remove(&self.id);
            debug!(id = self.id, "Subscription: observer removed");
        }
    }
}

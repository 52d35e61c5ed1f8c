//! Event Bus - pub/sub for loader events
//!
//! Backed by a tokio broadcast channel. Emitting never blocks; with no
//! subscribers the event is dropped.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::LoadEvent;
use crate::domain::NetworkTier;
use crate::loader::LoadPhase;
use crate::prefetch::PrefetchStatus;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Central event bus for loader activity
///
/// Clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LoadEvent>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LoadEvent) {
        debug!(event_type = event.event_type(), source = event.source(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LoadEvent> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Create an emitter bound to a task id, registry key or monitor name
    pub fn emitter_for(&self, source: impl Into<String>) -> EventEmitter {
        let source = source.into();
        debug!(%source, "EventBus::emitter_for: creating emitter");
        EventEmitter {
            tx: self.tx.clone(),
            source,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Cheap-to-clone handle that stamps every event with its source
#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<LoadEvent>,
    source: String,
}

impl EventEmitter {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Emit a raw event
    pub fn emit(&self, event: LoadEvent) {
        debug!(event_type = event.event_type(), "EventEmitter::emit");
        let _ = self.tx.send(event);
    }

    // === Convenience methods ===

    pub fn phase_changed(&self, phase: LoadPhase, attempt: u32) {
        self.emit(LoadEvent::PhaseChanged {
            source: self.source.clone(),
            phase,
            attempt,
        });
    }

    pub fn delay_started(&self, delay: Duration) {
        self.emit(LoadEvent::DelayStarted {
            source: self.source.clone(),
            delay_ms: delay.as_millis() as u64,
        });
    }

    pub fn producer_invoked(&self, attempt: u32) {
        self.emit(LoadEvent::ProducerInvoked {
            source: self.source.clone(),
            attempt,
        });
    }

    pub fn retry_scheduled(&self, attempt: u32, backoff: Duration) {
        self.emit(LoadEvent::RetryScheduled {
            source: self.source.clone(),
            attempt,
            backoff_ms: backoff.as_millis() as u64,
        });
    }

    pub fn network_changed(&self, tier: NetworkTier, online: bool) {
        self.emit(LoadEvent::NetworkChanged {
            source: self.source.clone(),
            tier,
            online,
        });
    }

    /// Emit a prefetch status change for a specific registry key
    pub fn prefetch_status(&self, key: &str, status: PrefetchStatus) {
        self.emit(LoadEvent::PrefetchStatusChanged {
            source: key.to_string(),
            status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_event_bus_subscribe() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);
        let _rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(16);
        bus.emitter_for("lonely").phase_changed(LoadPhase::Idle, 0);
    }

    #[tokio::test]
    async fn test_emitter_stamps_source() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let emitter = bus.emitter_for("reports");

        emitter.delay_started(Duration::from_millis(250));
        emitter.producer_invoked(0);
        emitter.retry_scheduled(1, Duration::from_secs(1));

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first,
            LoadEvent::DelayStarted {
                source: "reports".to_string(),
                delay_ms: 250
            }
        );
        assert_eq!(rx.recv().await.unwrap().event_type(), "ProducerInvoked");
        assert_eq!(rx.recv().await.unwrap().event_type(), "RetryScheduled");
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_prefetch_status_uses_key_as_source() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emitter_for("prefetch").prefetch_status("/leasing", PrefetchStatus::Loading);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.source(), "/leasing");
    }
}

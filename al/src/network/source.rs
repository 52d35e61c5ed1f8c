//! Connectivity signal sources

use tokio::sync::watch;
use tracing::debug;

use super::info::ConnectivitySignals;

/// Something that can report the current connectivity signals
pub trait SignalSource: Send + Sync {
    fn sample(&self) -> ConnectivitySignals;
}

/// Signals set explicitly by the embedding application (or a test)
pub struct StaticSignals {
    tx: watch::Sender<ConnectivitySignals>,
}

impl StaticSignals {
    pub fn new(signals: ConnectivitySignals) -> Self {
        debug!(?signals, "StaticSignals::new: called");
        let (tx, _) = watch::channel(signals);
        Self { tx }
    }

    /// Replace all signals
    pub fn set(&self, signals: ConnectivitySignals) {
        debug!(?signals, "StaticSignals::set: called");
        self.tx.send_replace(signals);
    }

    /// Flip only the online flag
    pub fn set_online(&self, online: bool) {
        debug!(online, "StaticSignals::set_online: called");
        self.tx.send_modify(|s| s.online = online);
    }
}

impl Default for StaticSignals {
    fn default() -> Self {
        Self::new(ConnectivitySignals::default())
    }
}

impl SignalSource for StaticSignals {
    fn sample(&self) -> ConnectivitySignals {
        self.tx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_signals_update() {
        let source = StaticSignals::default();
        assert!(source.sample().online);

        source.set_online(false);
        assert!(!source.sample().online);

        source.set(ConnectivitySignals::rich("3g", 1.0, 300, false));
        assert_eq!(source.sample().effective_type.as_deref(), Some("3g"));
    }
}

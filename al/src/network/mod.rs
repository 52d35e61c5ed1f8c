//! Network quality monitoring
//!
//! A [`SignalSource`] supplies raw connectivity signals; the
//! [`NetworkMonitor`] classifies them into a [`NetworkTier`](crate::domain::NetworkTier),
//! notifies observers on tier/online changes, and maps the current tier to a
//! [`LoadingStrategy`].

mod info;
mod monitor;
mod source;
mod strategy;

pub use info::{ConnectivitySignals, NetworkInfo};
pub use monitor::{NetworkMonitor, Subscription};
pub use source::{SignalSource, StaticSignals};
pub use strategy::LoadingStrategy;

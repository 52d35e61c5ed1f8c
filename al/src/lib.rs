//! AdaptiveLoad - network-aware priority loading
//!
//! A small scheduling core that decides *when* deferred resources load, based
//! on how urgent they are and how good the network currently is.
//!
//! # Core Concepts
//!
//! - **Tiers**: connectivity signals are classified into excellent, good, fair, poor or offline
//! - **Priorities**: every load declares an urgency, from critical down to lazy
//! - **Delay table**: priority and tier together fix the wait before a producer runs
//! - **Cooperative cancellation**: a task whose consumer has gone never writes state again
//!
//! # Modules
//!
//! - [`domain`] - Priorities, tiers and the delay table
//! - [`network`] - Signal sources, the network monitor and loading strategies
//! - [`loader`] - Priority load tasks and the batch scheduler
//! - [`prefetch`] - Prefetch registry and background/immediate queue
//! - [`visibility`] - Loads triggered by a region scrolling into view
//! - [`events`] - Event bus and JSONL event logging
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod loader;
pub mod network;
pub mod prefetch;
pub mod simulate;
pub mod visibility;

// Re-export commonly used types
pub use config::{Config, NetworkConfig};
pub use domain::{DelayTable, NetworkTier, PreloadDelay, Priority};
pub use error::LoadError;
pub use events::{EventBus, EventLogger, LoadEvent};
pub use loader::{
    Batch, BatchScheduler, LoadOptions, LoadPhase, LoadState, LoaderConfig, Producer, PriorityLoadTask, producer,
};
pub use network::{ConnectivitySignals, LoadingStrategy, NetworkInfo, NetworkMonitor, SignalSource, StaticSignals};
pub use prefetch::{PrefetchConfig, PrefetchQueue, PrefetchRegistry, PrefetchStats, PrefetchStatus};
pub use visibility::{RegionGeometry, VisibilityLoader, VisibilityOptions};

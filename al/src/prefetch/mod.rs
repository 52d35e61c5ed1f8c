//! Background prefetching of deferred resources
//!
//! A [`PrefetchRegistry`] names the resources worth warming. The
//! [`PrefetchQueue`] walks them sequentially during idle time, paced by the
//! [`DelayTable`](crate::domain::DelayTable), and also serves immediate
//! requests by path. Both paths share one in-flight load per key.

mod config;
mod queue;
mod registry;

pub use config::{PrefetchConfig, SimulatedEntry};
pub use queue::{PassSummary, PrefetchQueue, PrefetchQueueBuilder, PrefetchStats};
pub use registry::{PrefetchDefinition, PrefetchRegistry, PrefetchStatus};

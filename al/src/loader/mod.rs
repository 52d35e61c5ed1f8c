//! Priority-driven loading
//!
//! A [`PriorityLoadTask`] runs one producer through the
//! idle → delaying → loading → loaded/failed state machine, pacing itself by
//! the [`DelayTable`](crate::domain::DelayTable) and retrying with linear
//! backoff. A [`BatchScheduler`] issues a set of tasks in priority order with
//! a per-index stagger.

mod batch;
mod config;
mod producer;
mod state;
mod task;

pub use batch::{Batch, BatchScheduler};
pub use config::LoaderConfig;
pub use producer::{Producer, producer};
pub use state::{LoadPhase, LoadState};
pub use task::{LoadOptions, LoadTaskBuilder, PriorityLoadTask};

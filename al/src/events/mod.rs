//! Event bus for loader observability
//!
//! Load tasks, the network monitor and the prefetch queue emit [`LoadEvent`]s
//! to a shared bus. Consumers (the JSONL logger, tests, a UI) subscribe.
//!
//! ```text
//!  NetworkMonitor     PriorityLoadTask      PrefetchQueue
//!  NetworkChanged     PhaseChanged          PrefetchStatusChanged
//!                     DelayStarted
//!                     ProducerInvoked
//!                     RetryScheduled
//!        \                  |                   /
//!         +------------- EventBus --------------+
//!                   (tokio broadcast)
//!                           |
//!                 EventLogger (.jsonl)
//! ```

mod bus;
mod logger;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, EventEmitter};
pub use logger::{EventLogger, read_events, spawn_event_logger};
pub use types::{EventLogEntry, LoadEvent};

//! Core domain types shared by the monitor, loaders and prefetch queue

mod delay;
mod priority;
mod tier;

pub use delay::{DelayTable, PreloadDelay};
pub use priority::Priority;
pub use tier::NetworkTier;

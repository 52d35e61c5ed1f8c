//! Producer functions supplied by callers

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

/// Zero-argument async factory for the value being loaded
///
/// Calling the function is what "invoking the producer" means; the returned
/// future carries the producer's own latency.
pub type Producer<T> = Arc<dyn Fn() -> BoxFuture<'static, eyre::Result<T>> + Send + Sync>;

/// Wrap an async closure as a [`Producer`]
pub fn producer<T, F, Fut>(f: F) -> Producer<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = eyre::Result<T>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

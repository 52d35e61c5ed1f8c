//! Load error types

use std::time::Duration;
use thiserror::Error;

use crate::domain::Priority;

/// Errors surfaced by load tasks and the prefetch queue
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("Network unavailable for {priority} priority load")]
    NetworkUnavailable { priority: Priority },

    #[error("Load failed: {message}")]
    LoadFailure { message: String },

    #[error("Load timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("No prefetch entry matches {path}")]
    Unresolved { path: String },
}

impl LoadError {
    /// Wrap a producer error, keeping its context chain
    pub fn from_report(report: &eyre::Report) -> Self {
        LoadError::LoadFailure {
            message: format!("{:#}", report),
        }
    }

    /// Check if a load task may retry after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            LoadError::NetworkUnavailable { .. } => false,
            LoadError::LoadFailure { .. } => true,
            LoadError::Timeout { .. } => true,
            LoadError::Unresolved { .. } => false,
        }
    }

    /// Short machine-readable kind, used in events
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NetworkUnavailable { .. } => "network-unavailable",
            LoadError::LoadFailure { .. } => "load-failure",
            LoadError::Timeout { .. } => "timeout",
            LoadError::Unresolved { .. } => "unresolved",
        }
    }
}

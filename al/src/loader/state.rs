//! Load task state

use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Lifecycle phase of a load task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    #[default]
    Idle,
    Delaying,
    Loading,
    Loaded,
    Failed,
}

impl LoadPhase {
    /// Loaded or failed
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Loaded | Self::Failed)
    }
}

impl std::fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Delaying => write!(f, "delaying"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Observable state of one load task
///
/// `phase == Loaded` implies `error.is_none()`. `attempt` only grows until a
/// manual retry resets it.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadState<T> {
    pub phase: LoadPhase,
    pub attempt: u32,
    pub error: Option<LoadError>,
    /// 0 until loaded, then 100
    pub progress: u8,
    pub value: Option<T>,
}

impl<T> LoadState<T> {
    pub fn is_loaded(&self) -> bool {
        self.phase == LoadPhase::Loaded
    }

    pub fn is_loading(&self) -> bool {
        self.phase == LoadPhase::Loading
    }

    pub fn is_failed(&self) -> bool {
        self.phase == LoadPhase::Failed
    }

    pub(crate) fn mark_loaded(&mut self, value: T) {
        self.phase = LoadPhase::Loaded;
        self.progress = 100;
        self.error = None;
        self.value = Some(value);
    }

    pub(crate) fn mark_failed(&mut self, error: LoadError) {
        self.phase = LoadPhase::Failed;
        self.error = Some(error);
    }

    pub(crate) fn reset(&mut self) {
        self.phase = LoadPhase::Idle;
        self.attempt = 0;
        self.error = None;
        self.progress = 0;
        self.value = None;
    }
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        Self {
            phase: LoadPhase::Idle,
            attempt: 0,
            error: None,
            progress: 0,
            value: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_loaded_clears_error() {
        let mut state: LoadState<u32> = LoadState::default();
        state.error = Some(LoadError::LoadFailure {
            message: "first try".to_string(),
        });
        state.mark_loaded(7);
        assert!(state.is_loaded());
        assert!(state.error.is_none());
        assert_eq!(state.progress, 100);
        assert_eq!(state.value, Some(7));
    }

    #[test]
    fn test_reset() {
        let mut state: LoadState<u32> = LoadState::default();
        state.attempt = 2;
        state.mark_failed(LoadError::LoadFailure {
            message: "gave up".to_string(),
        });
        state.reset();
        assert_eq!(state, LoadState::default());
    }

    #[test]
    fn test_settled_phases() {
        assert!(LoadPhase::Loaded.is_settled());
        assert!(LoadPhase::Failed.is_settled());
        assert!(!LoadPhase::Delaying.is_settled());
        assert!(!LoadPhase::Idle.is_settled());
    }
}

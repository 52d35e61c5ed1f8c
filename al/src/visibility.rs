//! Visibility-triggered loading
//!
//! A [`VisibilityLoader`] holds a [`PriorityLoadTask`] back until the region
//! it feeds first scrolls into view. The embedding application reports region
//! geometry; nothing here talks to a real layout engine.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::LoadError;
use crate::loader::{LoadState, PriorityLoadTask};

/// When a region counts as visible
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityOptions {
    /// Fraction of the region (0.0 to 1.0) that must be inside the viewport
    pub threshold: f64,

    /// Pixels added above and below the viewport, so loading starts early
    pub margin: f64,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            margin: 50.0,
        }
    }
}

/// Vertical position of a region relative to the top of the viewport
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionGeometry {
    pub top: f64,
    pub bottom: f64,
    pub viewport_height: f64,
}

impl RegionGeometry {
    pub fn new(top: f64, bottom: f64, viewport_height: f64) -> Self {
        Self {
            top,
            bottom,
            viewport_height,
        }
    }

    /// Fraction of the region inside the viewport grown by `margin`, or `None` if it does not intersect
    pub fn visible_ratio(&self, margin: f64) -> Option<f64> {
        let upper = -margin;
        let lower = self.viewport_height + margin;
        let height = self.bottom - self.top;

        if height <= 0.0 {
            // Zero-height regions are visible while inside the band
            return (self.top >= upper && self.top <= lower).then_some(1.0);
        }

        let overlap = self.bottom.min(lower) - self.top.max(upper);
        (overlap > 0.0).then(|| (overlap / height).min(1.0))
    }

    pub fn is_visible(&self, options: &VisibilityOptions) -> bool {
        self.visible_ratio(options.margin)
            .is_some_and(|ratio| ratio >= options.threshold)
    }
}

/// Starts its task the first time the observed region becomes visible
///
/// Dropping the loader cancels the task.
pub struct VisibilityLoader<T: Clone + Send + Sync + 'static> {
    task: PriorityLoadTask<T>,
    options: VisibilityOptions,
    visible: AtomicBool,
    started: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> VisibilityLoader<T> {
    /// Wrap an unstarted task
    pub fn new(task: PriorityLoadTask<T>, options: VisibilityOptions) -> Self {
        debug!(id = task.id(), ?options, "VisibilityLoader::new: called");
        Self {
            task,
            options,
            visible: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    /// Record a visibility observation
    ///
    /// Returns true if this observation started the task.
    pub fn observe(&self, geometry: RegionGeometry) -> bool {
        let visible = geometry.is_visible(&self.options);
        self.visible.store(visible, Ordering::SeqCst);
        if !visible || self.started.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!(id = self.task.id(), "Region became visible, starting load");
        self.task.start()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn has_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Started and not yet loaded or failed
    pub fn is_loading(&self) -> bool {
        self.has_started() && !self.task.phase().is_settled()
    }

    pub fn error(&self) -> Option<LoadError> {
        self.task.state().error
    }

    pub fn value(&self) -> Option<T> {
        self.task.state().value
    }

    pub fn state(&self) -> LoadState<T> {
        self.task.state()
    }

    pub fn task(&self) -> &PriorityLoadTask<T> {
        &self.task
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for VisibilityLoader<T> {
    fn drop(&mut self) {
        self.task.cancel();
    }
}

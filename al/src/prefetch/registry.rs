//! Static table of prefetchable resources and path resolution

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Priority;
use crate::loader::Producer;

/// Lifecycle of one prefetch entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrefetchStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Error,
}

impl PrefetchStatus {
    /// Idle and errored entries are picked up by the next background pass
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Idle | Self::Error)
    }
}

impl std::fmt::Display for PrefetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loading => write!(f, "loading"),
            Self::Loaded => write!(f, "loaded"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One registered resource
pub struct PrefetchDefinition<T> {
    pub key: String,
    pub priority: Priority,
    pub producer: Producer<T>,
}

impl<T> Clone for PrefetchDefinition<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            priority: self.priority,
            producer: self.producer.clone(),
        }
    }
}

/// Registry of prefetchable keys plus substring patterns that map onto them
///
/// Keys are kept in registration order.
pub struct PrefetchRegistry<T> {
    definitions: Vec<PrefetchDefinition<T>>,
    patterns: Vec<(String, String)>,
}

impl<T> Default for PrefetchRegistry<T> {
    fn default() -> Self {
        Self {
            definitions: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

impl<T> PrefetchRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key; re-registering a key replaces it in place
    pub fn register(mut self, key: impl Into<String>, priority: Priority, producer: Producer<T>) -> Self {
        let key = key.into();
        debug!(%key, %priority, "PrefetchRegistry::register: called");
        let definition = PrefetchDefinition { key, priority, producer };
        match self.definitions.iter_mut().find(|d| d.key == definition.key) {
            Some(existing) => *existing = definition,
            None => self.definitions.push(definition),
        }
        self
    }

    /// Route any path containing `needle` to `key`
    pub fn pattern(mut self, needle: impl Into<String>, key: impl Into<String>) -> Self {
        let (needle, key) = (needle.into(), key.into());
        debug!(%needle, %key, "PrefetchRegistry::pattern: called");
        self.patterns.push((needle, key));
        self
    }

    pub fn get(&self, key: &str) -> Option<&PrefetchDefinition<T>> {
        self.definitions.iter().find(|d| d.key == key)
    }

    pub fn definitions(&self) -> &[PrefetchDefinition<T>] {
        &self.definitions
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Map a path onto a registered key
    ///
    /// Precedence: exact key, then the leading path segment
    /// (`/traditional/42` → `/traditional`), then the first pattern whose
    /// needle occurs in the path.
    pub fn resolve(&self, path: &str) -> Option<&str> {
        if let Some(definition) = self.get(path) {
            return Some(&definition.key);
        }

        if let Some(definition) = leading_segment(path).and_then(|segment| self.get(segment)) {
            return Some(&definition.key);
        }

        self.patterns
            .iter()
            .filter(|(needle, _)| path.contains(needle.as_str()))
            .find_map(|(_, key)| self.get(key))
            .map(|d| d.key.as_str())
    }
}

/// `/a/b/c` → `/a`; `None` for paths without a second segment
fn leading_segment(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('/')?;
    let end = rest.find('/')?;
    Some(&path[..end + 1])
}

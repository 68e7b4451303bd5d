// # Memory Source Registry
//
// In-memory implementation of SourceRegistry.
//
// ## Purpose
//
// Provides a simple, fast registry that doesn't persist across restarts.
// Useful for testing, or deployments where subscriptions are seeded from
// configuration on every start.
//
// ## Crash Behavior
//
// - All watermarks are lost on restart/crash
// - First cycle after a restart treats every source as never polled, so
//   posts created while the process was down are not delivered

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::RegistryConfig;
use crate::traits::source_registry::{RegistryChanges, Source, SourceRegistry, SourceRegistryFactory};
use crate::traits::ChannelId;

/// In-memory source registry
///
/// Sources are kept in a `BTreeMap`, so listing order is alphabetical by
/// name and stable across cycles.
///
/// # Example
///
/// ```rust,no_run
/// use feedcast_core::state::MemorySourceRegistry;
/// use feedcast_core::traits::{ChannelId, SourceRegistry};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = MemorySourceRegistry::new();
///     registry.subscribe("rust", ChannelId::new("1234")).await?;
///
///     let sources = registry.list_sources().await?;
///     assert_eq!(sources.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySourceRegistry {
    inner: Arc<RwLock<BTreeMap<String, Source>>>,
}

impl MemorySourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the given sources
    pub fn with_sources(sources: impl IntoIterator<Item = Source>) -> Self {
        let map = sources
            .into_iter()
            .map(|source| (source.name.clone(), source))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(map)),
        }
    }

    /// Insert or replace a source
    pub async fn insert(&self, source: Source) {
        self.inner.write().await.insert(source.name.clone(), source);
    }

    /// Get a copy of a source
    pub async fn get(&self, name: &str) -> Option<Source> {
        self.inner.read().await.get(name).cloned()
    }

    /// Get the number of sources
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Apply a change set to a source map
///
/// Shared by the memory and file registries. A queued removal only takes
/// effect if the source is still orphaned when the change set is applied.
pub(crate) fn apply_changes(sources: &mut BTreeMap<String, Source>, changes: &RegistryChanges) {
    for name in &changes.removed {
        match sources.get(name) {
            Some(source) if !source.is_orphaned() => {
                tracing::info!(
                    "Skipping prune of {}: it has {} channel(s) again",
                    name,
                    source.channels.len()
                );
            }
            _ => {
                sources.remove(name);
            }
        }
    }
    for (name, at) in &changes.watermarks {
        match sources.get_mut(name) {
            Some(source) => {
                if source.last_seen_at.is_none_or(|previous| previous < *at) {
                    source.last_seen_at = Some(*at);
                }
            }
            None => tracing::debug!("Ignoring watermark for unknown source {}", name),
        }
    }
}

/// Add a channel to a source, creating it if needed
///
/// Returns `true` if the map changed.
pub(crate) fn add_channel(sources: &mut BTreeMap<String, Source>, name: &str, channel: ChannelId) -> bool {
    let source = sources
        .entry(name.to_string())
        .or_insert_with(|| Source::new(name));
    if source.channels.contains(&channel) {
        return false;
    }
    source.channels.push(channel);
    true
}

/// Remove a channel from a source
///
/// Returns `true` if the map changed.
pub(crate) fn remove_channel(sources: &mut BTreeMap<String, Source>, name: &str, channel: &ChannelId) -> bool {
    match sources.get_mut(name) {
        Some(source) => {
            let before = source.channels.len();
            source.channels.retain(|c| c != channel);
            source.channels.len() != before
        }
        None => false,
    }
}

#[async_trait]
impl SourceRegistry for MemorySourceRegistry {
    async fn list_sources(&self) -> Result<Vec<Source>, Error> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn apply(&self, changes: RegistryChanges) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        apply_changes(&mut guard, &changes);
        Ok(())
    }

    async fn subscribe(&self, name: &str, channel: ChannelId) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::invalid_input("Source name cannot be empty"));
        }
        let mut guard = self.inner.write().await;
        add_channel(&mut guard, name, channel);
        Ok(())
    }

    async fn unsubscribe(&self, name: &str, channel: &ChannelId) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        remove_channel(&mut guard, name, channel);
        Ok(())
    }
}

/// Factory for creating memory registries
pub struct MemorySourceRegistryFactory;

#[async_trait]
impl SourceRegistryFactory for MemorySourceRegistryFactory {
    async fn create(&self, config: &RegistryConfig) -> Result<Box<dyn SourceRegistry>, Error> {
        match config {
            RegistryConfig::Memory => Ok(Box::new(MemorySourceRegistry::new())),
            _ => Err(Error::config("Invalid config for memory registry")),
        }
    }
}

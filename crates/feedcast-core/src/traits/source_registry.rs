// # Source Registry Trait
//
// Defines the interface for the persistent registry of subscribed sources.
//
// ## Purpose
//
// The registry owns the subscription configuration (which sources exist
// and which channels they deliver to) and the per-source watermark. The
// watermark is the only durable state the poll engine writes.
//
// ## Implementations
//
// - In-memory: `MemorySourceRegistry`
// - File-based: `FileSourceRegistry` (JSON, atomic writes)
//
// ## Usage
//
// ```rust,ignore
// use feedcast_core::SourceRegistry;
// use feedcast_core::traits::ChannelId;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let registry = /* SourceRegistry implementation */;
//
//     registry.subscribe("rust", ChannelId::new("123")).await?;
//     for source in registry.list_sources().await? {
//         println!("{} -> {:?}", source.name, source.last_seen_at);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message_sink::ChannelId;

/// A subscribed content source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Unique source name (e.g., "rust")
    pub name: String,

    /// Creation time of the newest delivered post
    ///
    /// `None` means the source has never been polled. The poller then uses
    /// the current time as baseline so no historical backlog is delivered.
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,

    /// Channels notified about new posts
    #[serde(default)]
    pub channels: Vec<ChannelId>,
}

impl Source {
    /// Create a never-polled source with no channels
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            last_seen_at: None,
            channels: Vec::new(),
        }
    }

    /// Add a channel
    pub fn with_channel(mut self, channel: impl Into<ChannelId>) -> Self {
        self.channels.push(channel.into());
        self
    }

    /// Set the watermark
    pub fn with_last_seen_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_seen_at = Some(at);
        self
    }

    /// Whether the source has no channels left and should be pruned
    pub fn is_orphaned(&self) -> bool {
        self.channels.is_empty()
    }
}

/// A unit of work applied atomically by the registry
///
/// Prunes and watermark saves performed during one cycle travel together,
/// so either all of them are durable or none are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryChanges {
    /// Sources to remove, if they are still orphaned when applied
    pub removed: Vec<String>,
    /// Watermarks to store, by source name
    pub watermarks: Vec<(String, DateTime<Utc>)>,
}

impl RegistryChanges {
    /// Create an empty change set
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a source removal
    pub fn remove(mut self, name: impl Into<String>) -> Self {
        self.removed.push(name.into());
        self
    }

    /// Queue a watermark save
    pub fn watermark(mut self, name: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.watermarks.push((name.into(), at));
        self
    }

    /// Whether there is nothing to apply
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.watermarks.is_empty()
    }
}

/// Trait for source registry implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently. Configuration edits
/// (`subscribe`/`unsubscribe`) may arrive while a cycle is running; the
/// implementation serializes them against `apply()`.
///
/// # Responsibilities
///
/// - Persist subscriptions and watermarks
/// - Apply `RegistryChanges` atomically
/// - Never decide what gets pruned or how far a watermark advances
///   (owned by `FeedPoller` and `WatermarkStore`)
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// List all registered sources in listing order
    async fn list_sources(&self) -> Result<Vec<Source>, crate::Error>;

    /// Load the channel references for a source
    ///
    /// The default implementation returns the channels carried by the
    /// listed source. Registries that store channels separately override it.
    async fn load_destinations(&self, source: &Source) -> Result<Vec<ChannelId>, crate::Error> {
        Ok(source.channels.clone())
    }

    /// Apply a change set atomically
    ///
    /// Watermarks for sources that no longer exist are ignored. A removal is
    /// skipped when the source gained a channel after it was queued.
    async fn apply(&self, changes: RegistryChanges) -> Result<(), crate::Error>;

    /// Remove a source that has no channels
    async fn remove_source(&self, name: &str) -> Result<(), crate::Error> {
        self.apply(RegistryChanges::new().remove(name)).await
    }

    /// Store the watermark for a source
    async fn save_watermark(&self, name: &str, at: DateTime<Utc>) -> Result<(), crate::Error> {
        self.apply(RegistryChanges::new().watermark(name, at)).await
    }

    /// Subscribe a channel to a source, creating the source if needed
    async fn subscribe(&self, name: &str, channel: ChannelId) -> Result<(), crate::Error>;

    /// Unsubscribe a channel from a source
    ///
    /// A source left without channels stays registered until the next poll
    /// cycle prunes it.
    async fn unsubscribe(&self, name: &str, channel: &ChannelId) -> Result<(), crate::Error>;
}

/// Helper trait for constructing source registries from configuration
#[async_trait]
pub trait SourceRegistryFactory: Send + Sync {
    /// Create a SourceRegistry instance from configuration
    async fn create(
        &self,
        config: &crate::config::RegistryConfig,
    ) -> Result<Box<dyn SourceRegistry>, crate::Error>;
}

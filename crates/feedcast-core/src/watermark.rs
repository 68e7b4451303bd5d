//! Per-source watermarks
//!
//! The watermark is the creation time of the newest post delivered for a
//! source. It is the only durable state the poll engine writes.
//!
//! Invariants:
//! - A stored watermark never moves backwards
//! - `advance()` is called once per source per cycle, after the whole page
//!   has been handed to the fan-out
//! - Prunes queued during a cycle are persisted in the same registry unit
//!   of work as the next watermark save

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::{RegistryChanges, Source, SourceRegistry};

/// Reads and advances source watermarks through the registry
pub struct WatermarkStore {
    registry: Arc<dyn SourceRegistry>,
    pending_prunes: Mutex<Vec<String>>,
}

impl WatermarkStore {
    /// Create a store backed by `registry`
    pub fn new(registry: Arc<dyn SourceRegistry>) -> Self {
        Self {
            registry,
            pending_prunes: Mutex::new(Vec::new()),
        }
    }

    /// The effective watermark of a source
    ///
    /// A never-polled source starts at `now`, so its backlog is not delivered.
    pub fn current(source: &Source, now: DateTime<Utc>) -> DateTime<Utc> {
        source.last_seen_at.unwrap_or(now)
    }

    /// Queue a source removal for the next unit of work
    pub async fn queue_prune(&self, name: &str) {
        let mut pending = self.pending_prunes.lock().await;
        if !pending.iter().any(|queued| queued == name) {
            pending.push(name.to_string());
        }
    }

    /// Number of prunes not yet persisted
    pub async fn pending_prunes(&self) -> usize {
        self.pending_prunes.lock().await.len()
    }

    /// Persist a new watermark for `source`
    ///
    /// The stored value is the later of the source's previous watermark and
    /// `new_watermark`. Queued prunes are applied in the same unit of work.
    ///
    /// # Returns
    ///
    /// - `Ok(DateTime)`: The watermark that is now durable
    /// - `Err(Error)`: Nothing was persisted; queued prunes stay queued
    pub async fn advance(&self, source: &Source, new_watermark: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let target = match source.last_seen_at {
            Some(previous) if previous > new_watermark => previous,
            _ => new_watermark,
        };

        let removed = std::mem::take(&mut *self.pending_prunes.lock().await);
        let changes = RegistryChanges {
            removed: removed.clone(),
            watermarks: vec![(source.name.clone(), target)],
        };

        match self.registry.apply(changes).await {
            Ok(()) => {
                debug!(
                    "Watermark for {} advanced to {} ({} prune(s) committed)",
                    source.name,
                    target,
                    removed.len()
                );
                Ok(target)
            }
            Err(e) => {
                self.requeue(removed).await;
                Err(e)
            }
        }
    }

    /// Persist prunes that no watermark save has carried yet
    ///
    /// Returns the number of committed removals.
    pub async fn flush_prunes(&self) -> Result<usize> {
        let removed = std::mem::take(&mut *self.pending_prunes.lock().await);
        if removed.is_empty() {
            return Ok(0);
        }

        let count = removed.len();
        let changes = RegistryChanges {
            removed: removed.clone(),
            watermarks: Vec::new(),
        };

        match self.registry.apply(changes).await {
            Ok(()) => Ok(count),
            Err(e) => {
                warn!("Failed to commit {} prune(s): {}", count, e);
                self.requeue(removed).await;
                Err(e)
            }
        }
    }

    async fn requeue(&self, removed: Vec<String>) {
        if removed.is_empty() {
            return;
        }
        let mut pending = self.pending_prunes.lock().await;
        let newer = std::mem::replace(&mut *pending, removed);
        for name in newer {
            if !pending.contains(&name) {
                pending.push(name);
            }
        }
    }
}

//! Source handle cache
//!
//! Memoizes `FeedBackend::resolve()` results by source name so a handle is
//! resolved once per process instead of once per cycle.
//!
//! The cache is owned by the poller. Entries are evicted explicitly when a
//! source is pruned, and the least recently used entry is dropped once the
//! configured capacity is exceeded.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::traits::{FeedBackend, FeedHandle};

/// Default maximum number of cached handles
pub const DEFAULT_HANDLE_CACHE_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Entry {
    handle: FeedHandle,
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Lazily resolving, LRU-bounded cache of feed handles
pub struct SourceHandleCache {
    backend: Arc<dyn FeedBackend>,
    capacity: usize,
    inner: Mutex<Inner>,
}

impl SourceHandleCache {
    /// Create a cache in front of `backend` holding at most `capacity` handles
    pub fn new(backend: Arc<dyn FeedBackend>, capacity: usize) -> Self {
        Self {
            backend,
            capacity: capacity.max(1),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Resolve a source name, hitting the backend only on a miss
    ///
    /// A failed resolution is not cached; the next call tries again.
    pub async fn resolve(&self, name: &str) -> Result<FeedHandle> {
        {
            let mut inner = self.inner.lock().await;
            let now = inner.tick();
            if let Some(entry) = inner.entries.get_mut(name) {
                entry.last_used = now;
                return Ok(entry.handle.clone());
            }
        }

        debug!("Handle cache miss for {}, resolving via {}", name, self.backend.backend_name());
        let handle = self.backend.resolve(name).await?;

        let mut inner = self.inner.lock().await;
        let now = inner.tick();
        inner.entries.insert(
            name.to_string(),
            Entry {
                handle: handle.clone(),
                last_used: now,
            },
        );

        if inner.entries.len() > self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                debug!("Handle cache full, evicting {}", oldest);
                inner.entries.remove(&oldest);
            }
        }

        Ok(handle)
    }

    /// The backend handles are resolved against
    pub fn backend(&self) -> &Arc<dyn FeedBackend> {
        &self.backend
    }

    /// Drop the cached handle for a source (called when it is pruned)
    pub async fn evict(&self, name: &str) -> bool {
        self.inner.lock().await.entries.remove(name).is_some()
    }

    /// Whether a handle for `name` is cached
    pub async fn contains(&self, name: &str) -> bool {
        self.inner.lock().await.entries.contains_key(name)
    }

    /// Number of cached handles
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Whether the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

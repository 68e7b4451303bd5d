// # Feed Backend Trait
//
// Defines the interface for resolving subscribed sources and fetching their
// most recent posts.
//
// ## Implementations
//
// - Reddit: `feedcast-reddit` crate
//
// ## Usage
//
// ```rust,ignore
// use feedcast_core::FeedBackend;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let backend = /* FeedBackend implementation */;
//
//     let handle = backend.resolve("rust").await?;
//     for post in backend.fetch_recent(&handle, 25).await? {
//         println!("{} by {}", post.title, post.author);
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A resolved reference to a source on the feed backend
///
/// Resolution may involve a network round trip, so handles are memoized
/// by `SourceHandleCache` for the lifetime of the poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedHandle {
    /// The source name as registered (e.g., "rust")
    pub name: String,
    /// Canonical listing path on the backend (e.g., "/r/rust/")
    pub path: String,
    /// Name as the backend displays it (may differ in case)
    pub display_name: String,
}

impl FeedHandle {
    /// Create a new feed handle
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            display_name: display_name.into(),
        }
    }
}

/// Body of a post: inline text or a link to external content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostBody {
    /// Self-post with inline text
    SelfText(String),
    /// Link post pointing to an external URL
    Link(String),
}

/// A single post fetched from a source
///
/// Posts are transient: they are never persisted beyond the watermark
/// they advance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Relative permalink (e.g., "/r/rust/comments/abc123/title/"); identifies the post
    pub permalink: String,
    /// Post title
    pub title: String,
    /// Author name
    pub author: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Post body
    pub body: PostBody,
}

impl Post {
    /// Whether this is a self-post
    pub fn is_self_post(&self) -> bool {
        matches!(self.body, PostBody::SelfText(_))
    }
}

/// Trait for feed backend implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// Backends own their transport: rate limiting, authentication and
/// pagination are opaque to the poller. They must not:
/// - Keep track of which posts were already seen (owned by `WatermarkStore`)
/// - Cache resolved handles (owned by `SourceHandleCache`)
/// - Retry failed requests across poll cycles (the next cycle retries)
#[async_trait]
pub trait FeedBackend: Send + Sync {
    /// Resolve a source name into a handle
    ///
    /// # Returns
    ///
    /// - `Ok(FeedHandle)`: The resolved handle
    /// - `Err(Error)`: The source does not exist or the request failed
    async fn resolve(&self, name: &str) -> Result<FeedHandle, crate::Error>;

    /// Fetch the most recent posts for a handle
    ///
    /// Posts are returned in the backend's natural order (newest first for
    /// Reddit). The page holds at most `limit` posts.
    async fn fetch_recent(
        &self,
        handle: &FeedHandle,
        limit: usize,
    ) -> Result<Vec<Post>, crate::Error>;

    /// Get the backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;
}

/// Helper trait for constructing feed backends from configuration
pub trait FeedBackendFactory: Send + Sync {
    /// Create a FeedBackend instance from configuration
    fn create(
        &self,
        config: &crate::config::BackendConfig,
    ) -> Result<Box<dyn FeedBackend>, crate::Error>;
}

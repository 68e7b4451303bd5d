// # Reddit Feed Backend
//
// This crate provides a Reddit feed backend for the feedcast system.
//
// ## Behavior
//
// - `resolve()` looks the subreddit up once via `/r/{name}/about.json`;
//   the poller caches the resulting handle
// - `fetch_recent()` reads one page of `/r/{name}/new.json`
// - One HTTP request per call, no retries (the next poll cycle is the retry)
//
// ## API Reference
//
// - Subreddit info: GET `/r/:name/about.json`
// - Newest posts: GET `/r/:name/new.json?limit=N`
//
// Both endpoints are public and unauthenticated but require a descriptive
// User-Agent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feedcast_core::PluginRegistry;
use feedcast_core::config::BackendConfig;
use feedcast_core::traits::{FeedBackend, FeedBackendFactory, FeedHandle, Post, PostBody};
use feedcast_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest page the listing endpoint serves
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct SubredditData {
    display_name: String,
    /// Relative path, e.g. "/r/rust/"
    url: String,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Thing<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    permalink: String,
    title: String,
    author: String,
    created_utc: f64,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    url: String,
}

impl LinkData {
    fn into_post(self) -> Option<Post> {
        let secs = self.created_utc.trunc() as i64;
        let nanos = (self.created_utc.fract() * 1e9) as u32;
        let created_at = DateTime::<Utc>::from_timestamp(secs, nanos)?;

        let body = if self.is_self {
            PostBody::SelfText(self.selftext)
        } else {
            PostBody::Link(self.url)
        };

        Some(Post {
            permalink: self.permalink,
            title: self.title,
            author: self.author,
            created_at,
            body,
        })
    }
}

/// Parse a `new.json` listing into posts
///
/// Non-link children and entries with an unrepresentable timestamp are
/// skipped. Page order is preserved.
pub fn parse_listing(body: &str) -> Result<Vec<Post>> {
    let listing: Thing<ListingData> = serde_json::from_str(body)?;
    if listing.kind != "Listing" {
        return Err(Error::provider(
            "reddit",
            format!("Expected a Listing, got kind {}", listing.kind),
        ));
    }

    let mut posts = Vec::with_capacity(listing.data.children.len());
    for child in listing.data.children {
        if child.kind != "t3" {
            continue;
        }
        let link: LinkData = serde_json::from_value(child.data)?;
        let permalink = link.permalink.clone();
        match link.into_post() {
            Some(post) => posts.push(post),
            None => warn!("Skipping post {} with invalid timestamp", permalink),
        }
    }
    Ok(posts)
}

/// Parse an `about.json` response into a handle
pub fn parse_about(name: &str, body: &str) -> Result<FeedHandle> {
    let about: Thing<SubredditData> = serde_json::from_str(body)?;
    if about.kind != "t5" {
        // Unknown names are redirected to a search listing instead of a 404
        return Err(Error::not_found(format!("Subreddit not found: {}", name)));
    }
    Ok(FeedHandle::new(
        name,
        about.data.url,
        about.data.display_name,
    ))
}

/// Map a non-success status to an error
fn status_error(status: reqwest::StatusCode, what: &str, body: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!("Access to {} denied. Status: {}", what, status)),
        404 => Error::not_found(what.to_string()),
        429 => Error::rate_limited(format!("Rate limit exceeded for {}. Status: {}", what, status)),
        500..=599 => Error::provider(
            "reddit",
            format!("Reddit server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(
            "reddit",
            format!("Request for {} failed: {} - {}", what, status, body),
        ),
    }
}

/// Reddit feed backend
pub struct RedditBackend {
    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for RedditBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedditBackend")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RedditBackend {
    /// Create a new Reddit backend
    ///
    /// # Parameters
    ///
    /// - `base_url`: API base URL (e.g., "https://www.reddit.com")
    /// - `user_agent`: User-Agent header sent with every request
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .user_agent(user_agent.into())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn about_url(&self, name: &str) -> String {
        format!("{}/r/{}/about.json", self.base_url, name)
    }

    fn listing_url(&self, handle: &FeedHandle, limit: usize) -> String {
        let path = if handle.path.ends_with('/') {
            handle.path.clone()
        } else {
            format!("{}/", handle.path)
        };
        format!(
            "{}{}new.json?limit={}",
            self.base_url,
            path,
            limit.clamp(1, MAX_PAGE_SIZE)
        )
    }

    async fn get_text(&self, url: &str, what: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request for {} failed: {}", what, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read response for {}: {}", what, e)))?;

        if !status.is_success() {
            return Err(status_error(status, what, &body));
        }
        Ok(body)
    }
}

#[async_trait]
impl FeedBackend for RedditBackend {
    async fn resolve(&self, name: &str) -> Result<FeedHandle> {
        if name.is_empty() {
            return Err(Error::invalid_input("Subreddit name cannot be empty"));
        }

        let what = format!("/r/{}", name);
        let body = self.get_text(&self.about_url(name), &what).await?;
        let handle = parse_about(name, &body)?;
        debug!("Resolved {} to {}", what, handle.path);
        Ok(handle)
    }

    async fn fetch_recent(&self, handle: &FeedHandle, limit: usize) -> Result<Vec<Post>> {
        let what = format!("/r/{}", handle.name);
        let body = self.get_text(&self.listing_url(handle, limit), &what).await?;
        parse_listing(&body)
    }

    fn backend_name(&self) -> &'static str {
        "reddit"
    }
}

/// Factory for creating Reddit backends
pub struct RedditFactory;

impl FeedBackendFactory for RedditFactory {
    fn create(&self, config: &BackendConfig) -> Result<Box<dyn FeedBackend>> {
        match config {
            BackendConfig::Reddit {
                base_url,
                user_agent,
            } => Ok(Box::new(RedditBackend::new(
                base_url.clone(),
                user_agent.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Reddit backend")),
        }
    }
}

/// Register the Reddit backend with a plugin registry
///
/// # Example
///
/// ```rust
/// use feedcast_core::PluginRegistry;
///
/// let plugins = PluginRegistry::new();
/// feedcast_reddit::register(&plugins);
/// assert!(plugins.has_backend("reddit"));
/// ```
pub fn register(plugins: &PluginRegistry) {
    plugins.register_backend("reddit", Box::new(RedditFactory));
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "children": [
                {
                    "kind": "t3",
                    "data": {
                        "permalink": "/r/rust/comments/abc/hello/",
                        "title": "Hello",
                        "author": "ferris",
                        "created_utc": 1700000000.0,
                        "is_self": true,
                        "selftext": "Some text",
                        "url": "https://www.reddit.com/r/rust/comments/abc/hello/"
                    }
                },
                {
                    "kind": "t3",
                    "data": {
                        "permalink": "/r/rust/comments/def/link/",
                        "title": "A link",
                        "author": "crab",
                        "created_utc": 1700000100.5,
                        "is_self": false,
                        "selftext": "",
                        "url": "https://blog.rust-lang.org/"
                    }
                },
                {
                    "kind": "more",
                    "data": {}
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_listing() {
        let posts = parse_listing(LISTING).unwrap();
        assert_eq!(posts.len(), 2);

        assert_eq!(posts[0].permalink, "/r/rust/comments/abc/hello/");
        assert_eq!(posts[0].body, PostBody::SelfText("Some text".to_string()));
        assert_eq!(posts[0].created_at.timestamp(), 1_700_000_000);

        assert_eq!(posts[1].body, PostBody::Link("https://blog.rust-lang.org/".to_string()));
        assert_eq!(posts[1].created_at.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_parse_listing_rejects_other_kinds() {
        let err = parse_listing(r#"{"kind": "t5", "data": {"children": []}}"#).unwrap_err();
        assert!(err.to_string().contains("Listing"));
    }

    #[test]
    fn test_parse_about() {
        let body = r#"{"kind": "t5", "data": {"display_name": "rust", "url": "/r/rust/"}}"#;
        let handle = parse_about("rust", body).unwrap();
        assert_eq!(handle.path, "/r/rust/");
        assert_eq!(handle.display_name, "rust");
    }

    #[test]
    fn test_parse_about_unknown_subreddit() {
        let body = r#"{"kind": "Listing", "data": {"display_name": "", "url": ""}}"#;
        assert!(matches!(parse_about("nope", body), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_status_mapping() {
        use reqwest::StatusCode;
        assert!(matches!(status_error(StatusCode::FORBIDDEN, "/r/x", ""), Error::Authentication(_)));
        assert!(matches!(status_error(StatusCode::NOT_FOUND, "/r/x", ""), Error::NotFound(_)));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "/r/x", ""),
            Error::RateLimited(_)
        ));
        assert!(status_error(StatusCode::BAD_GATEWAY, "/r/x", "").is_transient());
    }

    #[test]
    fn test_listing_url_clamps_limit() {
        let backend = RedditBackend::new("https://www.reddit.com/", "test-agent").unwrap();
        let handle = FeedHandle::new("rust", "/r/rust/", "rust");

        assert_eq!(
            backend.listing_url(&handle, 25),
            "https://www.reddit.com/r/rust/new.json?limit=25"
        );
        assert_eq!(
            backend.listing_url(&handle, 500),
            "https://www.reddit.com/r/rust/new.json?limit=100"
        );
    }

    #[test]
    fn test_factory_creation() {
        let factory = RedditFactory;
        assert!(factory.create(&BackendConfig::default()).is_ok());

        let custom = BackendConfig::Custom {
            factory: "rss".to_string(),
            config: serde_json::json!({}),
        };
        assert!(factory.create(&custom).is_err());
    }

    #[test]
    fn test_register() {
        let plugins = PluginRegistry::new();
        register(&plugins);
        assert!(plugins.has_backend("reddit"));
    }
}

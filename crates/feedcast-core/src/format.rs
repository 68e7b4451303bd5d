//! Post formatting
//!
//! Maps a fetched [`Post`] into the display [`Payload`] handed to the
//! message sink. Formatting is pure and cannot fail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::{Post, PostBody};

/// Maximum number of characters of self-text kept in a description
pub const MAX_EXCERPT_CHARS: usize = 500;

/// Appended to self-text that was cut at [`MAX_EXCERPT_CHARS`]
pub const TRUNCATION_MARKER: &str = "...";

/// Default site URL prefixed to permalinks
pub const DEFAULT_SITE_URL: &str = "https://reddit.com";

/// Display payload for one post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Post title
    pub title: String,
    /// Absolute link to the post
    pub url: String,
    /// Self-text excerpt or the linked URL
    pub description: String,
    /// Post creation time
    pub timestamp: DateTime<Utc>,
    /// Author name
    pub author_name: String,
    /// Link to the author's profile
    pub author_url: String,
}

/// Formats posts into payloads
#[derive(Debug, Clone)]
pub struct PostFormatter {
    site_url: String,
}

impl PostFormatter {
    /// Create a formatter for the given site URL (no trailing slash)
    pub fn new(site_url: impl Into<String>) -> Self {
        let site_url = site_url.into();
        Self {
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    /// Format a post
    pub fn format(&self, post: &Post) -> Payload {
        let description = match &post.body {
            PostBody::SelfText(text) => excerpt(text),
            PostBody::Link(url) => url.clone(),
        };

        Payload {
            title: post.title.clone(),
            url: format!("{}{}", self.site_url, post.permalink),
            description,
            timestamp: post.created_at,
            author_name: post.author.clone(),
            author_url: format!("{}/u/{}", self.site_url, post.author),
        }
    }

    /// Message title used for every notification of a source
    pub fn notification_title(&self, source_name: &str) -> String {
        format!("Post in /r/{}:", source_name)
    }
}

impl Default for PostFormatter {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_URL)
    }
}

/// Cut `text` to at most [`MAX_EXCERPT_CHARS`] characters
///
/// Counts characters, not bytes, so multi-byte text is never split inside
/// a code point.
fn excerpt(text: &str) -> String {
    match text.char_indices().nth(MAX_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

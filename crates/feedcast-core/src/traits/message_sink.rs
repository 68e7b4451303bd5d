// # Message Sink Trait
//
// Defines the interface for delivering formatted notifications to
// destination channels.
//
// ## Implementations
//
// - Discord: `feedcast-discord` crate
//
// ## Usage
//
// ```rust,ignore
// use feedcast_core::MessageSink;
// use feedcast_core::traits::ChannelId;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let sink = /* MessageSink implementation */;
//
//     let channels = vec![ChannelId::new("123456789")];
//     for destination in sink.resolve_destinations(&channels).await? {
//         sink.send(&destination, "Post in /r/rust:", &payload).await?;
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::Payload;

/// Reference to a destination channel as stored by the source registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub String);

impl ChannelId {
    /// Create a new channel reference
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A destination resolved by the message sink
///
/// Destinations are owned by the sink; sources only reference them by
/// `ChannelId`. A resolved destination is known to be reachable at the
/// time of resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// The channel this destination was resolved from
    pub channel: ChannelId,
    /// Human-readable label (for logging)
    pub label: String,
}

impl Destination {
    /// Create a new destination
    pub fn new(channel: ChannelId, label: impl Into<String>) -> Self {
        Self {
            channel,
            label: label.into(),
        }
    }
}

/// Trait for message sink implementations
///
/// # Thread Safety
///
/// `send()` is called concurrently for every destination of a post, so
/// implementations must be safe to share across tasks.
///
/// # Responsibilities
///
/// Sinks own their transport timeouts and rate limiting. They must not
/// retry deliveries across poll cycles; `DeliveryFanout` additionally wraps
/// every `send()` in its own deadline.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Resolve channel references into deliverable destinations
    ///
    /// Channels that are no longer reachable (deleted, permissions revoked)
    /// are left out of the result rather than reported as errors.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<Destination>)`: Reachable destinations (possibly empty)
    /// - `Err(Error)`: The sink itself is unavailable
    async fn resolve_destinations(
        &self,
        channels: &[ChannelId],
    ) -> Result<Vec<Destination>, crate::Error>;

    /// Deliver one payload to one destination
    async fn send(
        &self,
        destination: &Destination,
        title: &str,
        payload: &Payload,
    ) -> Result<(), crate::Error>;

    /// Get the sink name (for logging/debugging)
    fn sink_name(&self) -> &'static str;
}

/// Helper trait for constructing message sinks from configuration
pub trait MessageSinkFactory: Send + Sync {
    /// Create a MessageSink instance from configuration
    fn create(
        &self,
        config: &crate::config::SinkConfig,
    ) -> Result<Box<dyn MessageSink>, crate::Error>;
}

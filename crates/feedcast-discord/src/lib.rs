// # Discord Message Sink
//
// This crate provides a Discord message sink for the feedcast system.
//
// ## Behavior
//
// - `resolve_destinations()` looks every channel up via the bot API and
//   drops channels the bot can no longer see
// - `send()` posts one message with a single rich embed
// - One HTTP request per send, no retries (the poller's fan-out owns the
//   send deadline; a failed send is not repeated)
//
// ## Security Requirements
//
// - Bot token NEVER appears in logs or Debug output
// - Factory fails fast if the token is empty
//
// ## API Reference
//
// - Discord API v10: https://discord.com/developers/docs/reference
// - Get Channel: GET `/channels/:channel_id`
// - Create Message: POST `/channels/:channel_id/messages`

use async_trait::async_trait;
use feedcast_core::PluginRegistry;
use feedcast_core::config::SinkConfig;
use feedcast_core::format::Payload;
use feedcast_core::traits::{ChannelId, Destination, MessageSink, MessageSinkFactory};
use feedcast_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Embed accent color
const EMBED_COLOR: u32 = 0xFF4500;

/// Longest embed title Discord accepts, in characters
const MAX_EMBED_TITLE_CHARS: usize = 256;

#[derive(Debug, Serialize)]
struct EmbedAuthor {
    name: String,
    url: String,
}

#[derive(Debug, Serialize)]
struct Embed {
    title: String,
    url: String,
    description: String,
    /// ISO 8601
    timestamp: String,
    color: u32,
    author: EmbedAuthor,
}

#[derive(Debug, Serialize)]
struct CreateMessage {
    content: String,
    embeds: Vec<Embed>,
}

impl CreateMessage {
    fn new(title: &str, payload: &Payload) -> Self {
        Self {
            content: title.to_string(),
            embeds: vec![Embed {
                title: clamp_chars(&payload.title, MAX_EMBED_TITLE_CHARS),
                url: payload.url.clone(),
                description: payload.description.clone(),
                timestamp: payload.timestamp.to_rfc3339(),
                color: EMBED_COLOR,
                author: EmbedAuthor {
                    name: payload.author_name.clone(),
                    url: payload.author_url.clone(),
                },
            }],
        }
    }
}

/// Cut `text` to at most `max` characters
fn clamp_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct ChannelInfo {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

/// Map a non-success status to an error
fn status_error(status: reqwest::StatusCode, what: &str, body: &str) -> Error {
    match status.as_u16() {
        401 => Error::auth(format!("Invalid bot token. Status: {}", status)),
        403 => Error::provider(
            "discord",
            format!("Missing permissions for {}. Status: {}", what, status),
        ),
        404 => Error::not_found(what.to_string()),
        429 => Error::rate_limited(format!("Rate limit exceeded for {}. Status: {}", what, status)),
        500..=599 => Error::provider(
            "discord",
            format!("Discord server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(
            "discord",
            format!("Request for {} failed: {} - {}", what, status, body),
        ),
    }
}

/// Discord message sink
///
/// # Security
///
/// The Debug implementation does NOT expose the bot token.
pub struct DiscordSink {
    /// Bot token
    /// ⚠️ NEVER log this value
    bot_token: String,

    /// API base URL, without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for DiscordSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSink")
            .field("bot_token", &"<REDACTED>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl DiscordSink {
    /// Create a new Discord sink
    ///
    /// # Parameters
    ///
    /// - `bot_token`: Bot token (without the "Bot " prefix)
    /// - `api_base`: API base URL (e.g., "https://discord.com/api/v10")
    pub fn new(bot_token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let bot_token = bot_token.into();
        if bot_token.is_empty() {
            return Err(Error::config("Discord bot token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token)
    }

    fn channel_url(&self, channel: &ChannelId) -> String {
        format!("{}/channels/{}", self.api_base, channel)
    }

    fn messages_url(&self, channel: &ChannelId) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel)
    }
}

/// Look up one channel
async fn fetch_channel(
    client: reqwest::Client,
    url: String,
    auth: String,
    channel: ChannelId,
) -> Result<Destination> {
    let what = format!("channel {}", channel);
    let response = client
        .get(&url)
        .header("Authorization", auth)
        .send()
        .await
        .map_err(|e| Error::http(format!("Lookup of {} failed: {}", what, e)))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());
        return Err(status_error(status, &what, &body));
    }

    let info: ChannelInfo = response
        .json()
        .await
        .map_err(|e| Error::provider("discord", format!("Failed to parse channel: {}", e)))?;
    let label = match info.name {
        Some(name) => format!("#{}", name),
        None => info.id,
    };
    Ok(Destination::new(channel, label))
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn resolve_destinations(&self, channels: &[ChannelId]) -> Result<Vec<Destination>> {
        let mut lookups = JoinSet::new();
        for (index, channel) in channels.iter().enumerate() {
            let lookup = fetch_channel(
                self.client.clone(),
                self.channel_url(channel),
                self.auth_header(),
                channel.clone(),
            );
            lookups.spawn(async move { (index, lookup.await) });
        }

        let mut resolved = Vec::with_capacity(channels.len());
        while let Some(joined) = lookups.join_next().await {
            let (index, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("Channel lookup task aborted: {}", e);
                    continue;
                }
            };
            match result {
                Ok(destination) => resolved.push((index, destination)),
                // The token itself is bad; no channel will resolve
                Err(e @ Error::Authentication(_)) => return Err(e),
                Err(e) => {
                    info!("Dropping unreachable channel {}: {}", channels[index], e);
                }
            }
        }

        resolved.sort_by_key(|(index, _)| *index);
        Ok(resolved.into_iter().map(|(_, d)| d).collect())
    }

    async fn send(&self, destination: &Destination, title: &str, payload: &Payload) -> Result<()> {
        let what = format!("channel {}", destination.channel);
        let message = CreateMessage::new(title, payload);

        let response = self
            .client
            .post(self.messages_url(&destination.channel))
            .header("Authorization", self.auth_header())
            .json(&message)
            .send()
            .await
            .map_err(|e| Error::http(format!("Send to {} failed: {}", what, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &what, &body));
        }

        debug!("Posted {} to {}", payload.url, destination.label);
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "discord"
    }
}

/// Factory for creating Discord sinks
pub struct DiscordFactory;

impl MessageSinkFactory for DiscordFactory {
    fn create(&self, config: &SinkConfig) -> Result<Box<dyn MessageSink>> {
        match config {
            SinkConfig::Discord {
                bot_token,
                api_base,
            } => {
                if bot_token.is_empty() {
                    return Err(Error::config("Discord bot token is required"));
                }
                Ok(Box::new(DiscordSink::new(bot_token.clone(), api_base.clone())?))
            }
            _ => Err(Error::config("Invalid config for Discord sink")),
        }
    }
}

/// Register the Discord sink with a plugin registry
///
/// # Example
///
/// ```rust
/// use feedcast_core::PluginRegistry;
///
/// let plugins = PluginRegistry::new();
/// feedcast_discord::register(&plugins);
/// assert!(plugins.has_sink("discord"));
/// ```
pub fn register(plugins: &PluginRegistry) {
    plugins.register_sink("discord", Box::new(DiscordFactory));
}

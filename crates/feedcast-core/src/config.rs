//! Configuration types for the feedcast system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main feedcast configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedcastConfig {
    /// Feed backend configuration
    pub backend: BackendConfig,

    /// Message sink configuration
    pub sink: SinkConfig,

    /// Source registry configuration
    pub registry: RegistryConfig,

    /// Subscriptions seeded into the registry at startup
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionConfig>,

    /// Optional poller settings
    #[serde(default)]
    pub poller: PollerConfig,
}

impl FeedcastConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            backend: BackendConfig::default(),
            sink: SinkConfig::default(),
            registry: RegistryConfig::default(),
            subscriptions: Vec::new(),
            poller: PollerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.backend.validate()?;
        self.sink.validate()?;
        self.registry.validate()?;
        self.poller.validate()?;

        for subscription in &self.subscriptions {
            subscription.validate()?;
        }

        Ok(())
    }
}

impl Default for FeedcastConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Feed backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Reddit public listing API
    Reddit {
        /// API base URL
        #[serde(default = "default_reddit_base_url")]
        base_url: String,
        /// User agent sent with every request
        #[serde(default = "default_user_agent")]
        user_agent: String,
    },

    /// Custom backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl BackendConfig {
    /// Validate the backend configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BackendConfig::Reddit {
                base_url,
                user_agent,
            } => {
                if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Reddit base URL must use HTTP or HTTPS scheme. Got: {}",
                        base_url
                    )));
                }
                if user_agent.trim().is_empty() {
                    return Err(crate::Error::config("Reddit user agent cannot be empty"));
                }
                Ok(())
            }
            BackendConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom backend factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the backend type name
    pub fn type_name(&self) -> &str {
        match self {
            BackendConfig::Reddit { .. } => "reddit",
            BackendConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Reddit {
            base_url: default_reddit_base_url(),
            user_agent: default_user_agent(),
        }
    }
}

/// Message sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Discord bot REST API
    Discord {
        /// Bot token
        bot_token: String,
        /// API base URL
        #[serde(default = "default_discord_api_base")]
        api_base: String,
    },

    /// Custom sink
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SinkConfig {
    /// Validate the sink configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SinkConfig::Discord { bot_token, .. } => {
                if bot_token.is_empty() {
                    return Err(crate::Error::config("Discord bot token cannot be empty"));
                }
                Ok(())
            }
            SinkConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom sink factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &str {
        match self {
            SinkConfig::Discord { .. } => "discord",
            SinkConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Discord {
            bot_token: String::new(),
            api_base: default_discord_api_base(),
        }
    }
}

/// Source registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// File-based registry
    File {
        /// Path to the registry file
        path: String,
    },

    /// In-memory registry (not persistent)
    #[default]
    Memory,

    /// Custom registry
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RegistryConfig {
    /// Validate the registry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RegistryConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Registry file path cannot be empty"))
            }
            RegistryConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom registry factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the registry type name
    pub fn type_name(&self) -> &str {
        match self {
            RegistryConfig::File { .. } => "file",
            RegistryConfig::Memory => "memory",
            RegistryConfig::Custom { factory, .. } => factory,
        }
    }
}

/// A source and the channels it delivers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    /// Source name (e.g., "rust")
    pub source: String,

    /// Channel identifiers
    pub channels: Vec<String>,
}

impl SubscriptionConfig {
    /// Create a new subscription
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            channels: Vec::new(),
        }
    }

    /// Add a channel
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channels.push(channel.into());
        self
    }

    /// Validate the subscription
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.source.is_empty() {
            return Err(crate::Error::config("Subscription source cannot be empty"));
        }
        if !self
            .source
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Subscription source '{}' contains invalid characters. \
                Valid: ASCII alphanumeric and underscore only.",
                self.source
            )));
        }
        if self.channels.iter().any(|c| c.is_empty()) {
            return Err(crate::Error::config(format!(
                "Subscription '{}' has an empty channel id",
                self.source
            )));
        }
        Ok(())
    }
}

/// Poller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Interval between poll cycles (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Number of recent posts fetched per source per cycle
    ///
    /// More new posts than this between two cycles means the oldest of them
    /// are never delivered.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Deadline for a single delivery (in seconds)
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,

    /// Maximum number of cached source handles
    #[serde(default = "default_handle_cache_capacity")]
    pub handle_cache_capacity: usize,

    /// Site URL prefixed to post permalinks
    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Capacity of the poll event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl PollerConfig {
    /// Validate the poller configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.page_size == 0 {
            return Err(crate::Error::config("Page size must be > 0"));
        }
        if self.send_timeout_secs == 0 {
            return Err(crate::Error::config("Send timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    /// Interval as a `Duration`
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Send timeout as a `Duration`
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            page_size: default_page_size(),
            send_timeout_secs: default_send_timeout_secs(),
            handle_cache_capacity: default_handle_cache_capacity(),
            site_url: default_site_url(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_reddit_base_url() -> String {
    "https://www.reddit.com".to_string()
}

fn default_user_agent() -> String {
    concat!("feedcast/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_page_size() -> usize {
    25
}

fn default_send_timeout_secs() -> u64 {
    10
}

fn default_handle_cache_capacity() -> usize {
    crate::cache::DEFAULT_HANDLE_CACHE_CAPACITY
}

fn default_site_url() -> String {
    crate::format::DEFAULT_SITE_URL.to_string()
}

fn default_event_channel_capacity() -> usize {
    1000
}

// # feedcastd - Feed Relay Daemon
//
// This is a thin integration layer. All polling, delivery and watermark
// logic lives in feedcast-core; the daemon only wires components together.
//
// The feedcastd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering backends and sinks
// 4. Seeding subscriptions and running the poll scheduler until shutdown
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Feed Backend
// - `FEEDCAST_BACKEND_TYPE`: Backend type (reddit)
// - `FEEDCAST_REDDIT_BASE_URL`: API base URL (default https://www.reddit.com)
// - `FEEDCAST_REDDIT_USER_AGENT`: User-Agent sent to Reddit
//
// ### Message Sink
// - `FEEDCAST_SINK_TYPE`: Sink type (discord)
// - `FEEDCAST_DISCORD_BOT_TOKEN`: Bot token
//
// ### Source Registry
// - `FEEDCAST_REGISTRY_TYPE`: Registry type (file, memory)
// - `FEEDCAST_REGISTRY_PATH`: Path to registry file (for file registry)
//
// ### Subscriptions
// - `FEEDCAST_SUBSCRIPTIONS`: `source=chan1|chan2,other=chan3`
//
// When set, the list is authoritative: channels stored in the registry but
// no longer listed are unsubscribed at startup, and a source left without
// channels is pruned by the next poll cycle. When unset, the registry is
// used as is.
//
// ### Poller
// - `FEEDCAST_POLL_INTERVAL_SECS`: Seconds between cycles (10-3600, default 60)
// - `FEEDCAST_PAGE_SIZE`: Posts fetched per source (1-100, default 25)
// - `FEEDCAST_SEND_TIMEOUT_SECS`: Deadline per delivery (1-120, default 10)
// - `FEEDCAST_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export FEEDCAST_DISCORD_BOT_TOKEN=your_token
// export FEEDCAST_SUBSCRIPTIONS=rust=123456789012345678
// export FEEDCAST_REGISTRY_TYPE=file
// export FEEDCAST_REGISTRY_PATH=/var/lib/feedcast/registry.json
//
// feedcastd
// ```

use anyhow::{Context, Result};
use feedcast_core::config::{
    BackendConfig, PollerConfig, RegistryConfig, SinkConfig, SubscriptionConfig,
};
use feedcast_core::traits::ChannelId;
use feedcast_core::{FeedPoller, PluginRegistry, PollEvent, PollScheduler, SourceRegistry};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum FeedcastExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<FeedcastExitCode> for ExitCode {
    fn from(code: FeedcastExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    backend_type: String,
    reddit_base_url: Option<String>,
    reddit_user_agent: Option<String>,
    sink_type: String,
    discord_bot_token: String,
    registry_type: String,
    registry_path: Option<String>,
    subscriptions: Vec<SubscriptionConfig>,
    poll_interval_secs: u64,
    page_size: usize,
    send_timeout_secs: u64,
    log_level: String,
}

/// Read an optional numeric variable, failing on garbage
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is not a valid number ('{}'): {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

/// Parse `source=chan1|chan2,other=chan3`
fn parse_subscriptions(raw: &str) -> Result<Vec<SubscriptionConfig>> {
    let mut subscriptions = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (source, channels) = entry.split_once('=').with_context(|| {
            format!(
                "FEEDCAST_SUBSCRIPTIONS entry '{}' must look like source=channel",
                entry
            )
        })?;

        let mut subscription = SubscriptionConfig::new(source.trim());
        for channel in channels.split('|').map(str::trim).filter(|s| !s.is_empty()) {
            subscription = subscription.with_channel(channel);
        }
        subscriptions.push(subscription);
    }
    Ok(subscriptions)
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            backend_type: env::var("FEEDCAST_BACKEND_TYPE")
                .unwrap_or_else(|_| "reddit".to_string()),
            reddit_base_url: env::var("FEEDCAST_REDDIT_BASE_URL").ok(),
            reddit_user_agent: env::var("FEEDCAST_REDDIT_USER_AGENT").ok(),
            sink_type: env::var("FEEDCAST_SINK_TYPE").unwrap_or_else(|_| "discord".to_string()),
            discord_bot_token: env::var("FEEDCAST_DISCORD_BOT_TOKEN").unwrap_or_default(),
            registry_type: env::var("FEEDCAST_REGISTRY_TYPE")
                .unwrap_or_else(|_| "file".to_string()),
            registry_path: env::var("FEEDCAST_REGISTRY_PATH").ok(),
            subscriptions: parse_subscriptions(
                &env::var("FEEDCAST_SUBSCRIPTIONS").unwrap_or_default(),
            )?,
            poll_interval_secs: parse_var("FEEDCAST_POLL_INTERVAL_SECS", 60)?,
            page_size: parse_var("FEEDCAST_PAGE_SIZE", 25)?,
            send_timeout_secs: parse_var("FEEDCAST_SEND_TIMEOUT_SECS", 10)?,
            log_level: env::var("FEEDCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Component-level checks (URL schemes, source names) are repeated by
    /// the core config types; this covers daemon-only rules and ranges.
    fn validate(&self) -> Result<()> {
        match self.backend_type.as_str() {
            "reddit" => {}
            _ => anyhow::bail!(
                "FEEDCAST_BACKEND_TYPE '{}' is not supported. Supported backends: reddit",
                self.backend_type
            ),
        }

        match self.sink_type.as_str() {
            "discord" => {}
            _ => anyhow::bail!(
                "FEEDCAST_SINK_TYPE '{}' is not supported. Supported sinks: discord",
                self.sink_type
            ),
        }

        if self.discord_bot_token.is_empty() {
            anyhow::bail!(
                "FEEDCAST_DISCORD_BOT_TOKEN is required. \
                Set it via: export FEEDCAST_DISCORD_BOT_TOKEN=your_token"
            );
        }

        match self.registry_type.as_str() {
            "file" => match &self.registry_path {
                Some(path) if !path.is_empty() => {}
                _ => anyhow::bail!(
                    "FEEDCAST_REGISTRY_PATH is required when FEEDCAST_REGISTRY_TYPE=file. \
                    Set it via: export FEEDCAST_REGISTRY_PATH=/var/lib/feedcast/registry.json"
                ),
            },
            "memory" => {
                if self.subscriptions.is_empty() {
                    warn!("Memory registry without FEEDCAST_SUBSCRIPTIONS has nothing to poll");
                }
            }
            _ => anyhow::bail!(
                "FEEDCAST_REGISTRY_TYPE '{}' is not supported. Supported types: file, memory",
                self.registry_type
            ),
        }

        if !(10..=3600).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "FEEDCAST_POLL_INTERVAL_SECS must be between 10 and 3600 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        if !(1..=100).contains(&self.page_size) {
            anyhow::bail!(
                "FEEDCAST_PAGE_SIZE must be between 1 and 100. Got: {}",
                self.page_size
            );
        }

        if !(1..=120).contains(&self.send_timeout_secs) {
            anyhow::bail!(
                "FEEDCAST_SEND_TIMEOUT_SECS must be between 1 and 120 seconds. Got: {}",
                self.send_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "FEEDCAST_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn backend_config(&self) -> BackendConfig {
        match BackendConfig::default() {
            BackendConfig::Reddit {
                base_url,
                user_agent,
            } => BackendConfig::Reddit {
                base_url: self.reddit_base_url.clone().unwrap_or(base_url),
                user_agent: self.reddit_user_agent.clone().unwrap_or(user_agent),
            },
            other => other,
        }
    }

    fn sink_config(&self) -> SinkConfig {
        match SinkConfig::default() {
            SinkConfig::Discord { api_base, .. } => SinkConfig::Discord {
                bot_token: self.discord_bot_token.clone(),
                api_base,
            },
            other => other,
        }
    }

    fn registry_config(&self) -> RegistryConfig {
        match (self.registry_type.as_str(), &self.registry_path) {
            ("file", Some(path)) => RegistryConfig::File { path: path.clone() },
            _ => RegistryConfig::Memory,
        }
    }

    fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval_secs: self.poll_interval_secs,
            page_size: self.page_size,
            send_timeout_secs: self.send_timeout_secs,
            ..PollerConfig::default()
        }
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return FeedcastExitCode::ConfigError.into();
        }
    };

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return FeedcastExitCode::ConfigError.into();
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation error: {}", e);
        return FeedcastExitCode::ConfigError.into();
    }

    info!("Starting feedcastd daemon");
    info!(
        "Configuration loaded: {} subscription(s), polling every {}s",
        config.subscriptions.len(),
        config.poll_interval_secs
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return FeedcastExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        let scheduler = match build(&config).await {
            Ok(scheduler) => scheduler,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return FeedcastExitCode::ConfigError;
            }
        };

        if let Err(e) = run_daemon(scheduler).await {
            error!("Daemon error: {:#}", e);
            FeedcastExitCode::RuntimeError
        } else {
            FeedcastExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Assembled daemon: scheduler plus the task draining poll events
struct Daemon {
    scheduler: PollScheduler,
    events: tokio::task::JoinHandle<()>,
}

/// Create every component from config
async fn build(config: &Config) -> Result<Daemon> {
    let plugins = PluginRegistry::with_builtin_registries();

    #[cfg(feature = "reddit")]
    {
        info!("Registering Reddit backend");
        feedcast_reddit::register(&plugins);
    }

    #[cfg(feature = "discord")]
    {
        info!("Registering Discord sink");
        feedcast_discord::register(&plugins);
    }

    let backend = plugins
        .create_backend(&config.backend_config())
        .context("Failed to create feed backend")?;
    let sink = plugins
        .create_sink(&config.sink_config())
        .context("Failed to create message sink")?;
    let registry: Arc<dyn SourceRegistry> = Arc::from(
        plugins
            .create_registry(&config.registry_config())
            .await
            .context("Failed to open source registry")?,
    );

    seed_subscriptions(registry.as_ref(), &config.subscriptions).await?;

    let poller_config = config.poller_config();
    let interval = poller_config.interval();
    let (poller, mut event_rx) = FeedPoller::new(
        registry,
        Arc::from(backend),
        Arc::from(sink),
        poller_config,
    )?;

    let events = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                PollEvent::SourceFailed { source, error } => {
                    warn!("Source {} failed this cycle: {}", source, error)
                }
                other => debug!("Poll event: {:?}", other),
            }
        }
    });

    Ok(Daemon {
        scheduler: PollScheduler::new(Arc::new(poller), interval)?,
        events,
    })
}

/// Run the scheduler until a shutdown signal arrives
async fn run_daemon(daemon: Daemon) -> Result<()> {
    let Daemon { scheduler, events } = daemon;

    let shutdown = shutdown_signal()?;
    scheduler.run_until(shutdown).await?;

    // Dropping the poller closes the event channel
    drop(scheduler);
    if let Err(e) = events.await {
        warn!("Event logger ended abnormally: {}", e);
    }

    info!("Shutting down daemon");
    Ok(())
}

/// Future resolving on SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()> + Send> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received shutdown signal: {}", name);
    })
}

/// Future resolving on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl std::future::Future<Output = ()> + Send> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal: SIGINT");
    })
}

/// Bring the registry in line with the configured subscriptions
async fn seed_subscriptions(
    registry: &dyn SourceRegistry,
    subscriptions: &[SubscriptionConfig],
) -> Result<()> {
    if subscriptions.is_empty() {
        return Ok(());
    }

    for subscription in subscriptions {
        subscription.validate()?;
        for channel in &subscription.channels {
            registry
                .subscribe(&subscription.source, ChannelId::new(channel.as_str()))
                .await
                .with_context(|| format!("Failed to subscribe {}", subscription.source))?;
        }
        info!(
            "Subscribed /r/{} -> {} channel(s)",
            subscription.source,
            subscription.channels.len()
        );
    }

    let sources = registry
        .list_sources()
        .await
        .context("Failed to list registered sources")?;
    for source in sources {
        let listed = subscriptions
            .iter()
            .find(|subscription| subscription.source == source.name);
        for channel in &source.channels {
            let keep = listed.is_some_and(|subscription| {
                subscription
                    .channels
                    .iter()
                    .any(|c| c.as_str() == channel.as_str())
            });
            if keep {
                continue;
            }
            registry
                .unsubscribe(&source.name, channel)
                .await
                .with_context(|| format!("Failed to unsubscribe {}", source.name))?;
            info!("Unsubscribed /r/{} -> {} (no longer configured)", source.name, channel);
        }
    }
    Ok(())
}

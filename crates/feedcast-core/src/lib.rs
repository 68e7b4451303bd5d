// # feedcast-core
//
// Core library for the feed-to-chat relay.
//
// ## Architecture Overview
//
// This library polls content feeds and relays new posts to chat channels:
// - **FeedBackend**: Trait for resolving sources and fetching recent posts
// - **MessageSink**: Trait for resolving channels and delivering notifications
// - **SourceRegistry**: Trait for subscriptions and per-source watermarks
// - **FeedPoller**: Core engine that runs one poll cycle over every source
// - **PollScheduler**: Drives the poller on a fixed interval
// - **PluginRegistry**: Plugin-based registry for backends, sinks and registries
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Failure Isolation**: One source or one destination failing never stops the others
// 3. **Plugin-Based**: Components are registered dynamically, no hard-coded if-else
// 4. **Library-First**: All core functionality can be used as a library
// 5. **At-Least-Once**: A watermark only moves after its page was delivered

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod format;
pub mod plugins;
pub mod scheduler;
pub mod state;
pub mod traits;
pub mod watermark;

// Re-export core types for convenience
pub use config::{
    BackendConfig, FeedcastConfig, PollerConfig, RegistryConfig, SinkConfig, SubscriptionConfig,
};
pub use engine::{CycleReport, FeedPoller, PollEvent, SourceOutcome};
pub use error::{Error, Result};
pub use format::{Payload, PostFormatter};
pub use plugins::PluginRegistry;
pub use scheduler::PollScheduler;
pub use state::{FileSourceRegistry, MemorySourceRegistry};
pub use traits::{FeedBackend, MessageSink, SourceRegistry};

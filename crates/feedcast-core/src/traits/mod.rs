//! Core traits for the feedcast system
//!
//! This module defines the abstract interfaces of the poll engine's collaborators.
//!
//! - [`FeedBackend`]: Resolve sources and fetch recent posts
//! - [`MessageSink`]: Resolve channels and deliver notifications
//! - [`SourceRegistry`]: Persistent subscriptions and watermarks

pub mod feed_backend;
pub mod message_sink;
pub mod source_registry;

pub use feed_backend::{FeedBackend, FeedBackendFactory, FeedHandle, Post, PostBody};
pub use message_sink::{ChannelId, Destination, MessageSink, MessageSinkFactory};
pub use source_registry::{RegistryChanges, Source, SourceRegistry, SourceRegistryFactory};

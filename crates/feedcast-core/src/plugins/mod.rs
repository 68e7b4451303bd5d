//! Plugin-based component registry
//!
//! The registry allows feed backends, message sinks and source registries
//! to be registered dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use feedcast_core::plugins::PluginRegistry;
//! use feedcast_core::config::BackendConfig;
//!
//! let plugins = PluginRegistry::with_builtin_registries();
//!
//! // Plugin crates register themselves
//! feedcast_reddit::register(&plugins);
//!
//! let backend = plugins.create_backend(&BackendConfig::default())?;
//! ```

use crate::config::{BackendConfig, RegistryConfig, SinkConfig};
use crate::error::{Error, Result};
use crate::state::{FileSourceRegistryFactory, MemorySourceRegistryFactory};
use crate::traits::{FeedBackend, MessageSink, SourceRegistry};
use crate::traits::{FeedBackendFactory, MessageSinkFactory, SourceRegistryFactory};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of component factories keyed by type name
///
/// ## Thread Safety
///
/// Interior mutability with RwLock allows concurrent reads and exclusive
/// writes. Registration happens once at startup.
#[derive(Default)]
pub struct PluginRegistry {
    backends: RwLock<HashMap<String, Box<dyn FeedBackendFactory>>>,
    sinks: RwLock<HashMap<String, Box<dyn MessageSinkFactory>>>,
    registries: RwLock<HashMap<String, Arc<dyn SourceRegistryFactory>>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in `file` and `memory` source registries
    pub fn with_builtin_registries() -> Self {
        let plugins = Self::new();
        plugins.register_registry("file", Box::new(FileSourceRegistryFactory));
        plugins.register_registry("memory", Box::new(MemorySourceRegistryFactory));
        plugins
    }

    /// Register a feed backend factory
    pub fn register_backend(&self, name: impl Into<String>, factory: Box<dyn FeedBackendFactory>) {
        self.backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a message sink factory
    pub fn register_sink(&self, name: impl Into<String>, factory: Box<dyn MessageSinkFactory>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register a source registry factory
    pub fn register_registry(
        &self,
        name: impl Into<String>,
        factory: Box<dyn SourceRegistryFactory>,
    ) {
        self.registries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::from(factory));
    }

    /// Create a feed backend from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn FeedBackend>)`: Created backend
    /// - `Err(Error)`: If the type is not registered or creation fails
    pub fn create_backend(&self, config: &BackendConfig) -> Result<Box<dyn FeedBackend>> {
        let backend_type = config.type_name();
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);

        let factory = backends
            .get(backend_type)
            .ok_or_else(|| Error::config(format!("Unknown backend type: {}", backend_type)))?;

        factory.create(config)
    }

    /// Create a message sink from configuration
    pub fn create_sink(&self, config: &SinkConfig) -> Result<Box<dyn MessageSink>> {
        let sink_type = config.type_name();
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);

        let factory = sinks
            .get(sink_type)
            .ok_or_else(|| Error::config(format!("Unknown sink type: {}", sink_type)))?;

        factory.create(config)
    }

    /// Create a source registry from configuration
    pub async fn create_registry(&self, config: &RegistryConfig) -> Result<Box<dyn SourceRegistry>> {
        let registry_type = config.type_name();

        // Release the lock before calling async create
        let factory = {
            let registries = self.registries.read().unwrap_or_else(PoisonError::into_inner);
            registries
                .get(registry_type)
                .ok_or_else(|| Error::config(format!("Unknown registry type: {}", registry_type)))?
                .clone()
        };

        factory.create(config).await
    }

    /// List all registered backend types
    pub fn list_backends(&self) -> Vec<String> {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
        backends.keys().cloned().collect()
    }

    /// List all registered sink types
    pub fn list_sinks(&self) -> Vec<String> {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        sinks.keys().cloned().collect()
    }

    /// Check if a backend type is registered
    pub fn has_backend(&self, name: &str) -> bool {
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
        backends.contains_key(name)
    }

    /// Check if a sink type is registered
    pub fn has_sink(&self, name: &str) -> bool {
        let sinks = self.sinks.read().unwrap_or_else(PoisonError::into_inner);
        sinks.contains_key(name)
    }

    /// Check if a registry type is registered
    pub fn has_registry(&self, name: &str) -> bool {
        let registries = self.registries.read().unwrap_or_else(PoisonError::into_inner);
        registries.contains_key(name)
    }
}

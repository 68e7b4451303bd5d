// # File Source Registry
//
// File-based implementation of SourceRegistry with crash recovery.
//
// ## Purpose
//
// Persists subscriptions and watermarks across daemon restarts, so posts
// are neither re-delivered nor skipped after a restart.
//
// ## Crash Recovery
//
// - Atomic writes: every change set is written to a temp file, then renamed
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## Durability
//
// A change set only becomes visible in memory after its file write
// succeeded. A failed write leaves both the file and the in-memory view at
// their previous values, so a watermark is never reported advanced unless
// it is on disk.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "sources": {
//     "rust": {
//       "name": "rust",
//       "last_seen_at": "2025-01-09T12:00:00Z",
//       "channels": ["123456789"]
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::memory::{add_channel, apply_changes, remove_channel};
use crate::Error;
use crate::config::RegistryConfig;
use crate::traits::ChannelId;
use crate::traits::source_registry::{RegistryChanges, Source, SourceRegistry, SourceRegistryFactory};

/// Registry file format version
/// Used for future migration if format changes
const REGISTRY_FILE_VERSION: &str = "1.0";

/// File-based source registry with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use feedcast_core::state::FileSourceRegistry;
/// use feedcast_core::traits::{ChannelId, SourceRegistry};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let registry = FileSourceRegistry::new("/var/lib/feedcast/registry.json").await?;
///
///     // Subscribe (atomically written to disk)
///     registry.subscribe("rust", ChannelId::new("1234")).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSourceRegistry {
    path: PathBuf,
    sources: Arc<RwLock<BTreeMap<String, Source>>>,
}

/// Serializable registry file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct RegistryFileFormat {
    version: String,
    sources: BTreeMap<String, Source>,
}

impl FileSourceRegistry {
    /// Create or load a file registry
    ///
    /// This will:
    /// 1. Try to load the existing registry file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with an empty registry
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create registry directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let sources = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            sources: Arc::new(RwLock::new(sources)),
        })
    }

    /// Load the registry with automatic recovery
    ///
    /// Only parse failures trigger recovery; I/O errors propagate.
    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, Source>, Error> {
        let e = match Self::load(path).await {
            Ok(sources) => {
                tracing::debug!("Loaded registry from file: {} sources", sources.len());
                return Ok(sources);
            }
            Err(e @ Error::Json(_)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Registry file appears corrupted: {}. Attempting recovery from backup.",
            e
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty registry.");
            return Ok(BTreeMap::new());
        }

        match Self::load(&backup_path).await {
            Ok(sources) => {
                tracing::info!("Recovered registry from backup: {} sources", sources.len());

                if let Err(restore_err) = fs::copy(&backup_path, path).await {
                    tracing::error!(
                        "Failed to restore registry file from backup: {}",
                        restore_err
                    );
                }

                Ok(sources)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty registry.",
                    backup_err
                );
                Ok(BTreeMap::new())
            }
        }
    }

    /// Load the registry from a file
    async fn load(path: &Path) -> Result<BTreeMap<String, Source>, Error> {
        if !path.exists() {
            tracing::debug!("Registry file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::registry(format!(
                "Failed to read registry file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: RegistryFileFormat = serde_json::from_str(&content)?;

        if file.version != REGISTRY_FILE_VERSION {
            tracing::warn!(
                "Registry file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                REGISTRY_FILE_VERSION,
                file.version
            );
        }

        Ok(file.sources)
    }

    /// Write a snapshot to the file atomically
    async fn write(&self, sources: &BTreeMap<String, Source>) -> Result<(), Error> {
        let file = RegistryFileFormat {
            version: REGISTRY_FILE_VERSION.to_string(),
            sources: sources.clone(),
        };

        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::registry(format!("Failed to serialize registry: {}", e)))?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::registry(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            out.write_all(json.as_bytes()).await.map_err(|e| {
                Error::registry(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            out.sync_all().await.map_err(|e| {
                Error::registry(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::registry(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Registry written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply `mutate` to a copy of the sources, persist it, then publish it
    ///
    /// The write lock is held for the whole operation so config edits and
    /// cycle commits are serialized.
    async fn commit<F>(&self, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BTreeMap<String, Source>) -> bool + Send,
    {
        let mut guard = self.sources.write().await;
        let mut next = guard.clone();
        if !mutate(&mut next) {
            return Ok(());
        }
        self.write(&next).await?;
        *guard = next;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Path of the registry file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceRegistry for FileSourceRegistry {
    async fn list_sources(&self) -> Result<Vec<Source>, Error> {
        Ok(self.sources.read().await.values().cloned().collect())
    }

    async fn apply(&self, changes: RegistryChanges) -> Result<(), Error> {
        if changes.is_empty() {
            return Ok(());
        }
        self.commit(|sources| {
            apply_changes(sources, &changes);
            true
        })
        .await
    }

    async fn subscribe(&self, name: &str, channel: ChannelId) -> Result<(), Error> {
        if name.is_empty() {
            return Err(Error::invalid_input("Source name cannot be empty"));
        }
        self.commit(|sources| add_channel(sources, name, channel)).await
    }

    async fn unsubscribe(&self, name: &str, channel: &ChannelId) -> Result<(), Error> {
        self.commit(|sources| remove_channel(sources, name, channel))
            .await
    }
}

/// Factory for creating file registries
pub struct FileSourceRegistryFactory;

#[async_trait]
impl SourceRegistryFactory for FileSourceRegistryFactory {
    async fn create(&self, config: &RegistryConfig) -> Result<Box<dyn SourceRegistry>, Error> {
        match config {
            RegistryConfig::File { path } => Ok(Box::new(FileSourceRegistry::new(path).await?)),
            _ => Err(Error::config("Invalid config for file registry")),
        }
    }
}

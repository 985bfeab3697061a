//! Activated-channel list persisted as a JSON array on disk.

use crate::limits::{AdmissionLimits, Gate};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

/// Errors that can occur while persisting channels
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Channels the bot answers in.
///
/// Memory is authoritative; every change is written through to `path`.
#[derive(Debug)]
pub struct ActiveChannels {
    path: PathBuf,
    channels: RwLock<BTreeSet<String>>,
    /// Held across snapshot and write so the file always ends at the latest set
    save_lock: Mutex<()>,
    limits: AdmissionLimits,
}

impl ActiveChannels {
    /// Load the channel list from `path`.
    ///
    /// A missing file starts empty. A corrupt file is logged and also starts
    /// empty; it is overwritten on the next change.
    pub async fn load(path: impl Into<PathBuf>, limits: AdmissionLimits) -> Self {
        let path = path.into();
        let channels = match limits.run(Gate::FileIo, read_channels(&path)).await {
            Ok(channels) => {
                info!(count = channels.len(), path = %path.display(), "Loaded active channels");
                channels
            }
            Err(StorageError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No active channels file, starting empty");
                BTreeSet::new()
            }
            Err(e) => {
                warn!(path = %path.display(), "Could not read active channels, starting empty: {e}");
                BTreeSet::new()
            }
        };

        Self {
            path,
            channels: RwLock::new(channels),
            save_lock: Mutex::new(()),
            limits,
        }
    }

    /// Whether the bot is active in `channel_id`
    pub async fn is_active(&self, channel_id: &str) -> bool {
        self.channels.read().await.contains(channel_id)
    }

    /// Activate a channel. Returns `false` if it already was active.
    pub async fn activate(&self, channel_id: &str) -> bool {
        if !self.channels.write().await.insert(channel_id.to_string()) {
            return false;
        }
        info!("Bot activated in channel: {channel_id}");
        self.persist().await;
        true
    }

    /// Deactivate a channel. Returns `false` if it was not active.
    pub async fn deactivate(&self, channel_id: &str) -> bool {
        if !self.channels.write().await.remove(channel_id) {
            return false;
        }
        info!("Bot deactivated in channel: {channel_id}");
        self.persist().await;
        true
    }

    /// Number of active channels
    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Whether no channel is active
    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }

    /// Write the current set. Writers queue on `save_lock` and each one
    /// snapshots after acquiring it, so the last write carries every change.
    async fn persist(&self) {
        let _saving = self.save_lock.lock().await;
        let snapshot = self.channels.read().await.clone();
        let result = self
            .limits
            .run(Gate::FileIo, write_channels(&self.path, &snapshot))
            .await;
        if let Err(e) = result {
            error!(path = %self.path.display(), "Failed to save active channels: {e}");
        }
    }
}

async fn read_channels(path: &Path) -> Result<BTreeSet<String>, StorageError> {
    let raw = tokio::fs::read(path).await?;
    let ids: Vec<String> = serde_json::from_slice(&raw)?;
    Ok(ids.into_iter().collect())
}

async fn write_channels(path: &Path, channels: &BTreeSet<String>) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(&channels.iter().collect::<Vec<_>>())?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("active_channels_{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let store = ActiveChannels::load(temp_path(), AdmissionLimits::default()).await;
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_activate_deactivate_persists() -> Result<(), StorageError> {
        let path = temp_path();
        let store = ActiveChannels::load(&path, AdmissionLimits::default()).await;

        assert!(store.activate("100").await);
        assert!(!store.activate("100").await);
        assert!(store.activate("200").await);
        assert!(store.is_active("100").await);

        let reloaded = ActiveChannels::load(&path, AdmissionLimits::default()).await;
        assert_eq!(reloaded.len().await, 2);

        assert!(store.deactivate("100").await);
        assert!(!store.deactivate("100").await);
        let on_disk = read_channels(&path).await?;
        assert_eq!(on_disk.into_iter().collect::<Vec<_>>(), vec!["200".to_string()]);

        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_activations_all_reach_disk() -> Result<(), StorageError> {
        let path = temp_path();
        // Several file permits, so writes could overlap without the save lock
        let store = Arc::new(ActiveChannels::load(&path, AdmissionLimits::new(1, 1, 4)).await);

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.activate(&i.to_string()).await })
            })
            .collect();
        for handle in handles {
            assert!(matches!(handle.await, Ok(true)));
        }

        assert_eq!(store.len().await, 32);
        assert_eq!(read_channels(&path).await?.len(), 32);
        let reloaded = ActiveChannels::load(&path, AdmissionLimits::default()).await;
        assert_eq!(reloaded.len().await, 32);

        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() -> Result<(), StorageError> {
        let path = temp_path();
        tokio::fs::write(&path, b"{ not json").await?;
        let store = ActiveChannels::load(&path, AdmissionLimits::default()).await;
        assert!(store.is_empty().await);
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}

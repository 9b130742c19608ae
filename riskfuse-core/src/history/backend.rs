use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::PersistenceError;

/// Durable key-value storage holding serialized history records.
#[async_trait]
pub trait HistoryBackend: Send + Sync + fmt::Debug {
    /// `Ok(None)` when nothing was ever stored under `key`.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError>;

    /// Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), PersistenceError>;
}

/// Process-local backend, used by tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryHistoryBackend {
    records: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryHistoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryBackend for MemoryHistoryBackend {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.records
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.records.write().await.remove(key);
        Ok(())
    }
}

/// On-disk backend over `cacache`: content-addressed, integrity-checked
/// blobs plus an index mapping the collection key to its latest blob.
#[derive(Clone)]
pub struct CacacheHistoryBackend {
    root: PathBuf,
}

impl fmt::Debug for CacacheHistoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacacheHistoryBackend")
            .field(&self.root)
            .finish()
    }
}

impl CacacheHistoryBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn map_read_error(key: &str, err: cacache::Error) -> PersistenceError {
    match err {
        cacache::Error::EntryNotFound(_, _) => {
            PersistenceError::Backend(format!("history entry not found: {key}"))
        }
        cacache::Error::IntegrityError(err) => {
            PersistenceError::Integrity(format!("{key} ({err})"))
        }
        cacache::Error::SizeMismatch(wanted, actual) => PersistenceError::Integrity(
            format!("size mismatch: key={key}, wanted={wanted}, actual={actual}"),
        ),
        cacache::Error::IoError(_, msg) => {
            PersistenceError::Backend(format!("cacache read I/O error: {msg}"))
        }
        cacache::Error::SerdeError(_, msg) => {
            PersistenceError::Backend(format!("cacache read serde error: {msg}"))
        }
    }
}

#[async_trait]
impl HistoryBackend for CacacheHistoryBackend {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        match cacache::read(&self.root, key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(err) => Err(map_read_error(key, err)),
        }
    }

    async fn store(&self, key: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        let previous = self.current_integrity(key).await?;
        let written = cacache::write(&self.root, key, bytes)
            .await
            .map_err(|e| PersistenceError::Backend(format!("cacache write failed: {e}")))?;

        match previous {
            Some(old) if old != written => self.drop_content(&old).await,
            _ => Ok(()),
        }
    }

    async fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let Some(integrity) = self.current_integrity(key).await? else {
            return Ok(());
        };

        cacache::index::RemoveOpts::new()
            .remove_fully(true)
            .remove(&self.root, key)
            .await
            .map_err(|e| PersistenceError::Backend(format!("cacache remove failed: {e}")))?;
        self.drop_content(&integrity).await
    }
}

impl CacacheHistoryBackend {
    async fn current_integrity(
        &self,
        key: &str,
    ) -> Result<Option<cacache::Integrity>, PersistenceError> {
        cacache::metadata(&self.root, key)
            .await
            .map(|meta| meta.map(|meta| meta.integrity))
            .map_err(|e| PersistenceError::Backend(format!("cacache metadata failed: {e}")))
    }

    /// Content blobs are not reference counted; each key owns the blob it
    /// points at.
    async fn drop_content(&self, integrity: &cacache::Integrity) -> Result<(), PersistenceError> {
        if !cacache::exists(&self.root, integrity).await {
            return Ok(());
        }
        cacache::remove_hash(&self.root, integrity)
            .await
            .map_err(|e| PersistenceError::Backend(format!("cacache remove_hash failed: {e}")))
    }
}

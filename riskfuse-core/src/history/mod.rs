//! Capped, newest-first record of finished scans.
//!
//! The whole collection lives as one JSON array under a single well-known
//! key; filtering is a linear scan over at most `capacity` entries.

mod backend;

pub use backend::{CacacheHistoryBackend, HistoryBackend, MemoryHistoryBackend};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use riskfuse_model::{HistoryEntry, HistoryEntryId, HistoryFilter, HistoryStats};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::PersistenceError;

pub const DEFAULT_HISTORY_KEY: &str = "riskfuse/scan-history/v1";
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct HistoryStore {
    backend: Arc<dyn HistoryBackend>,
    key: String,
    capacity: usize,
    // Serializes read-modify-write cycles on the collection.
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self::with_options(backend, DEFAULT_HISTORY_KEY, DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_options(
        backend: Arc<dyn HistoryBackend>,
        key: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            backend,
            key: key.into(),
            capacity: capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryHistoryBackend::new()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Every stored entry, newest first.
    pub async fn entries(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
        match self.backend.load(&self.key).await? {
            Some(bytes) if !bytes.is_empty() => Ok(serde_json::from_slice(&bytes)?),
            _ => Ok(Vec::new()),
        }
    }

    async fn persist(&self, entries: &[HistoryEntry]) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(entries)?;
        self.backend.store(&self.key, &bytes).await
    }

    /// Prepend a batch and evict the oldest entries beyond capacity.
    pub async fn try_append(
        &self,
        batch: Vec<HistoryEntry>,
    ) -> Result<usize, PersistenceError> {
        if batch.is_empty() {
            return Ok(0);
        }
        let _guard = self.write_lock.lock().await;

        let added = batch.len();
        let mut entries = batch;
        entries.extend(self.entries().await?);
        let evicted = entries.len().saturating_sub(self.capacity);
        entries.truncate(self.capacity);
        self.persist(&entries).await?;

        debug!(added, evicted, stored = entries.len(), "history appended");
        Ok(entries.len())
    }

    /// Like [`HistoryStore::try_append`], but a storage failure is logged
    /// and the append skipped. Returns whether the batch was persisted.
    pub async fn append(&self, batch: Vec<HistoryEntry>) -> bool {
        match self.try_append(batch).await {
            Ok(_) => true,
            Err(err) => {
                warn!(key = %self.key, error = %err, "history append skipped");
                false
            }
        }
    }

    pub async fn list(
        &self,
        filter: &HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        self.list_at(filter, Utc::now()).await
    }

    /// Filter against an explicit clock, for date windows.
    pub async fn list_at(
        &self,
        filter: &HistoryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, PersistenceError> {
        Ok(self
            .entries()
            .await?
            .into_iter()
            .filter(|entry| filter.matches(entry, now))
            .collect())
    }

    /// Returns `false` when no entry carried `id`.
    pub async fn remove(&self, id: HistoryEntryId) -> Result<bool, PersistenceError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.entries().await?;
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.persist(&entries).await?;
        Ok(true)
    }

    pub async fn clear(&self) -> Result<(), PersistenceError> {
        let _guard = self.write_lock.lock().await;
        self.backend.remove(&self.key).await
    }

    pub async fn stats(&self) -> Result<HistoryStats, PersistenceError> {
        Ok(HistoryStats::tally(&self.entries().await?))
    }
}

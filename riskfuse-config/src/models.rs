use std::path::{Path, PathBuf};
use std::sync::Arc;

use riskfuse_core::history::{DEFAULT_HISTORY_CAPACITY, DEFAULT_HISTORY_KEY};
use riskfuse_core::{
    CacacheHistoryBackend, FusionEngine, FusionPolicy, HistoryStore, HttpSignalSettings,
};
use riskfuse_model::ConcurrencyLimit;

/// Where the configuration file (if any) came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    Explicit(PathBuf),
    EnvPath(PathBuf),
    File(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::Default => None,
            ConfigSource::Explicit(path)
            | ConfigSource::EnvPath(path)
            | ConfigSource::File(path) => Some(path),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigMetadata {
    pub source: ConfigSource,
    pub env_file_loaded: bool,
    /// Names of the environment variables that overrode a value.
    pub env_overrides: Vec<&'static str>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchConfig {
    pub concurrency_limit: ConcurrencyLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    pub dir: PathBuf,
    pub key: String,
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/history"),
            key: DEFAULT_HISTORY_KEY.to_string(),
            capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl HistoryConfig {
    /// Open the durable store rooted at `dir`.
    pub fn open_store(&self) -> HistoryStore {
        HistoryStore::with_options(
            Arc::new(CacacheHistoryBackend::new(&self.dir)),
            self.key.clone(),
            self.capacity,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub signal: HttpSignalSettings,
    pub batch: BatchConfig,
    pub fusion: FusionPolicy,
    pub history: HistoryConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn fusion_engine(&self) -> FusionEngine {
        FusionEngine::new(self.fusion)
    }

    pub fn concurrency_limit(&self) -> ConcurrencyLimit {
        self.batch.concurrency_limit
    }
}

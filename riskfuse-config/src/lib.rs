//! Runtime configuration for riskfuse.
//!
//! Values are layered: built-in defaults, then an optional TOML/JSON file
//! (`$RISKFUSE_CONFIG_PATH`, `riskfuse.toml`, `config/riskfuse.toml`), then
//! individual `RISKFUSE_*` environment overrides. A `.env` file is honoured
//! when present.
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod sources;

pub use loader::{ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::{BatchConfig, Config, ConfigMetadata, ConfigSource, HistoryConfig};
pub use sources::{EnvConfig, FileConfig};

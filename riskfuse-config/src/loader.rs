use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use riskfuse_core::FusionPolicy;
use riskfuse_core::fusion::{DEFAULT_TWO_SIGNAL_ML_WEIGHT, DEFAULT_TWO_SIGNAL_REPUTATION_WEIGHT};
use riskfuse_model::ConcurrencyLimit;
use thiserror::Error;
use tracing::debug;

use crate::models::{Config, ConfigMetadata, ConfigSource};
use crate::sources::{EnvConfig, FileConfig, FileFusionConfig};

const DEFAULT_CONFIG_LOCATIONS: &[&str] = &[
    "riskfuse.toml",
    "riskfuse.json",
    "config/riskfuse.toml",
];

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoadError {
    fn invalid(field: &'static str, value: impl ToString, reason: impl ToString) -> Self {
        ConfigLoadError::InvalidValue {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Skip reading `.env` entirely.
    pub skip_env_file: bool,
    /// Directory the default config locations are resolved against.
    pub search_dir: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.options.skip_env_file = true;
        self
    }

    pub fn with_search_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.options.search_dir = Some(dir.into());
        self
    }

    /// Load `.env`, then resolve against the process environment.
    pub fn load(&self) -> Result<Config, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        let mut config = self.resolve(EnvConfig::gather())?;
        config.metadata.env_file_loaded = env_file_loaded;
        Ok(config)
    }

    /// Resolve against an injected environment lookup; `.env` is not read.
    pub fn load_with<F>(&self, lookup: F) -> Result<Config, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.resolve(EnvConfig::gather_with(lookup))
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.options.skip_env_file {
            return Ok(false);
        }
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };
        Ok(loaded)
    }

    fn resolve(&self, env: EnvConfig) -> Result<Config, ConfigLoadError> {
        let (file, source) = self.load_file_config(&env)?;
        let mut config = compose(file, &env)?;
        config.metadata.source = source;
        debug!(source = ?config.metadata.source, overrides = ?config.metadata.env_overrides, "configuration resolved");
        Ok(config)
    }

    fn default_location(&self) -> Option<PathBuf> {
        let base = self.options.search_dir.as_deref().unwrap_or(Path::new(""));
        DEFAULT_CONFIG_LOCATIONS
            .iter()
            .map(|candidate| base.join(candidate))
            .find(|path| path.exists())
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(FileConfig, ConfigSource), ConfigLoadError> {
        let (path, source) = if let Some(explicit) = &self.options.config_path {
            (explicit.clone(), ConfigSource::Explicit(explicit.clone()))
        } else if let Some(from_env) = &env.config_path {
            (from_env.clone(), ConfigSource::EnvPath(from_env.clone()))
        } else if let Some(found) = self.default_location() {
            (found.clone(), ConfigSource::File(found))
        } else {
            return Ok((FileConfig::default(), ConfigSource::Default));
        };

        if !path.exists() {
            return Err(ConfigLoadError::MissingConfig { path });
        }
        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file = parse_file_config(&path, &contents)?;
        Ok((file, source))
    }
}

/// TOML by default; `.json` files are read as JSON.
pub fn parse_file_config(path: &Path, contents: &str) -> Result<FileConfig, ConfigLoadError> {
    let parse_error = |message: String| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        message,
    };
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(contents).map_err(|e| parse_error(e.to_string())),
        _ => toml::from_str(contents).map_err(|e| parse_error(e.to_string())),
    }
}

pub fn parse_timeout(raw: &str) -> Result<Duration, ConfigLoadError> {
    let duration = humantime::parse_duration(raw.trim())
        .map_err(|e| ConfigLoadError::invalid("request_timeout", raw, e))?;
    if duration.is_zero() {
        return Err(ConfigLoadError::invalid(
            "request_timeout",
            raw,
            "must be greater than zero",
        ));
    }
    Ok(duration)
}

pub fn parse_concurrency(raw: &str) -> Result<ConcurrencyLimit, ConfigLoadError> {
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|e| ConfigLoadError::invalid("concurrency_limit", raw, e))?;
    ConcurrencyLimit::new(value).map_err(|e| ConfigLoadError::invalid("concurrency_limit", raw, e))
}

fn parse_weight(field: &'static str, value: f64) -> Result<f64, ConfigLoadError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigLoadError::invalid(field, value, "must be a non-negative number"))
    }
}

pub fn parse_policy(raw: &str, file: &FileFusionConfig) -> Result<FusionPolicy, ConfigLoadError> {
    match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "four_signal" => Ok(FusionPolicy::FourSignal),
        "two_signal" => Ok(FusionPolicy::TwoSignal {
            reputation_weight: parse_weight(
                "reputation_weight",
                file.reputation_weight
                    .unwrap_or(DEFAULT_TWO_SIGNAL_REPUTATION_WEIGHT),
            )?,
            ml_weight: parse_weight(
                "ml_weight",
                file.ml_weight.unwrap_or(DEFAULT_TWO_SIGNAL_ML_WEIGHT),
            )?,
        }),
        _ => Err(ConfigLoadError::invalid(
            "policy",
            raw,
            "expected four_signal or two_signal",
        )),
    }
}

fn compose(file: FileConfig, env: &EnvConfig) -> Result<Config, ConfigLoadError> {
    let mut config = Config::default();
    let mut overrides = Vec::new();

    // signal
    let signal = &mut config.signal;
    if let Some(url) = &env.base_url {
        overrides.push("RISKFUSE_BASE_URL");
        signal.base_url = url.clone();
    } else if let Some(url) = file.signal.base_url {
        signal.base_url = url;
    }
    if signal.base_url.trim().is_empty() {
        return Err(ConfigLoadError::invalid("base_url", "", "must not be empty"));
    }
    if let Some(raw) = &env.request_timeout {
        overrides.push("RISKFUSE_TIMEOUT");
        signal.request_timeout = parse_timeout(raw)?;
    } else if let Some(raw) = &file.signal.request_timeout {
        signal.request_timeout = parse_timeout(raw)?;
    }
    if let Some(key) = &env.api_key {
        overrides.push("RISKFUSE_API_KEY");
        signal.api_key = Some(key.clone());
    } else if let Some(key) = file.signal.api_key.filter(|k| !k.trim().is_empty()) {
        signal.api_key = Some(key);
    }
    let endpoints = file.signal.endpoints;
    if let Some(path) = endpoints.upload {
        signal.endpoints.upload = path;
    }
    if let Some(path) = endpoints.reputation {
        signal.endpoints.reputation = path;
    }
    if let Some(path) = endpoints.classify {
        signal.endpoints.classify = path;
    }
    if let Some(path) = endpoints.combined {
        signal.endpoints.combined = path;
    }

    // batch
    if let Some(raw) = &env.concurrency {
        overrides.push("RISKFUSE_CONCURRENCY");
        config.batch.concurrency_limit = parse_concurrency(raw)?;
    } else if let Some(limit) = file.batch.concurrency_limit {
        config.batch.concurrency_limit = parse_concurrency(&limit.to_string())?;
    }

    // fusion
    if let Some(raw) = &env.fusion_policy {
        overrides.push("RISKFUSE_FUSION_POLICY");
        config.fusion = parse_policy(raw, &file.fusion)?;
    } else if let Some(raw) = &file.fusion.policy {
        config.fusion = parse_policy(raw, &file.fusion)?;
    }

    // history
    if let Some(dir) = &env.history_dir {
        overrides.push("RISKFUSE_HISTORY_DIR");
        config.history.dir = dir.clone();
    } else if let Some(dir) = file.history.dir {
        config.history.dir = dir;
    }
    if let Some(key) = file.history.key.filter(|k| !k.trim().is_empty()) {
        config.history.key = key;
    }
    if let Some(capacity) = file.history.capacity {
        if capacity == 0 {
            return Err(ConfigLoadError::invalid("capacity", 0, "must be at least 1"));
        }
        config.history.capacity = capacity;
    }

    config.metadata = ConfigMetadata {
        env_overrides: overrides,
        ..ConfigMetadata::default()
    };
    Ok(config)
}

impl Config {
    /// Load using the process environment and `.env`.
    pub fn load() -> Result<Self, ConfigLoadError> {
        ConfigLoader::new().load()
    }

    /// Load using an injected environment lookup.
    pub fn load_with<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        ConfigLoader::new().load_with(lookup)
    }
}

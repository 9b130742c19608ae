use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as written in a TOML (or JSON) file. Every field is
/// optional; anything left out falls back to the built-in defaults.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub signal: FileSignalConfig,
    #[serde(default)]
    pub batch: FileBatchConfig,
    #[serde(default)]
    pub fusion: FileFusionConfig,
    #[serde(default)]
    pub history: FileHistoryConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSignalConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Humantime duration, e.g. `30s` or `1m 30s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoints: FileEndpointsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileEndpointsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classify: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileBatchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency_limit: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFusionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation_weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_weight: Option<f64>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileHistoryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// Environment-derived configuration values, kept raw until validation.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub concurrency: Option<String>,
    pub request_timeout: Option<String>,
    pub fusion_policy: Option<String>,
    pub history_dir: Option<PathBuf>,
    pub api_key: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::gather_with(|name| std::env::var(name).ok())
    }

    /// Collect values through an arbitrary lookup. Blank values count as unset.
    pub fn gather_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        Self {
            config_path: var("RISKFUSE_CONFIG_PATH").map(PathBuf::from),
            base_url: var("RISKFUSE_BASE_URL"),
            concurrency: var("RISKFUSE_CONCURRENCY"),
            request_timeout: var("RISKFUSE_TIMEOUT"),
            fusion_policy: var("RISKFUSE_FUSION_POLICY"),
            history_dir: var("RISKFUSE_HISTORY_DIR").map(PathBuf::from),
            api_key: var("RISKFUSE_API_KEY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn blank_env_values_are_ignored() {
        let vars: HashMap<&str, &str> = [
            ("RISKFUSE_BASE_URL", "  "),
            ("RISKFUSE_CONCURRENCY", " 5 "),
            ("RISKFUSE_HISTORY_DIR", "/var/lib/riskfuse"),
        ]
        .into_iter()
        .collect();
        let env = EnvConfig::gather_with(|name| vars.get(name).map(|v| v.to_string()));

        assert!(env.base_url.is_none());
        assert_eq!(env.concurrency.as_deref(), Some("5"));
        assert_eq!(env.history_dir, Some(PathBuf::from("/var/lib/riskfuse")));
        assert!(env.api_key.is_none());
    }

    #[test]
    fn file_config_sections_are_optional() {
        let parsed: FileConfig = toml::from_str(
            r#"
            [batch]
            concurrency_limit = 7
            "#,
        )
        .unwrap();
        assert_eq!(parsed.batch.concurrency_limit, Some(7));
        assert!(parsed.signal.base_url.is_none());
        assert!(parsed.history.capacity.is_none());
    }
}

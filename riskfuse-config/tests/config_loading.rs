use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use riskfuse_config::{ConfigLoadError, ConfigLoader, ConfigSource};
use riskfuse_core::FusionPolicy;
use tempfile::TempDir;

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

fn isolated(dir: &TempDir) -> ConfigLoader {
    ConfigLoader::new().without_env_file().with_search_dir(dir.path())
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = TempDir::new().unwrap();
    let config = isolated(&dir).load_with(env(&[])).unwrap();

    assert_eq!(config.signal.base_url, "http://localhost:8000");
    assert_eq!(config.signal.endpoints.upload, "/files/upload");
    assert_eq!(config.signal.endpoints.reputation, "/hash/scan");
    assert_eq!(config.signal.endpoints.classify, "/ember/");
    assert_eq!(config.signal.endpoints.combined, "/combined/");
    assert_eq!(config.signal.request_timeout, Duration::from_secs(30));
    assert!(config.signal.api_key.is_none());
    assert_eq!(config.batch.concurrency_limit.get(), 3);
    assert_eq!(config.fusion, FusionPolicy::FourSignal);
    assert_eq!(config.history.dir, PathBuf::from("./data/history"));
    assert_eq!(config.history.key, "riskfuse/scan-history/v1");
    assert_eq!(config.history.capacity, 100);
    assert_eq!(config.metadata.source, ConfigSource::Default);
    assert!(config.metadata.env_overrides.is_empty());
}

#[test]
fn default_location_file_is_picked_up() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("riskfuse.toml"),
        r#"
[signal]
base_url = "http://scanner.internal:9000"
request_timeout = "2m"

[signal.endpoints]
classify = "/ml/v2/"

[batch]
concurrency_limit = 6

[fusion]
policy = "two_signal"
reputation_weight = 0.7
ml_weight = 0.3

[history]
capacity = 50
"#,
    )
    .unwrap();

    let config = isolated(&dir).load_with(env(&[])).unwrap();
    assert_eq!(config.signal.base_url, "http://scanner.internal:9000");
    assert_eq!(config.signal.request_timeout, Duration::from_secs(120));
    assert_eq!(config.signal.endpoints.classify, "/ml/v2/");
    assert_eq!(config.signal.endpoints.upload, "/files/upload");
    assert_eq!(config.batch.concurrency_limit.get(), 6);
    assert_eq!(
        config.fusion,
        FusionPolicy::TwoSignal {
            reputation_weight: 0.7,
            ml_weight: 0.3
        }
    );
    assert_eq!(config.history.capacity, 50);
    assert_eq!(
        config.metadata.source,
        ConfigSource::File(dir.path().join("riskfuse.toml"))
    );
}

#[test]
fn environment_overrides_file_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("custom.json");
    fs::write(
        &path,
        r#"{ "signal": { "base_url": "http://from-file" }, "batch": { "concurrency_limit": 2 } }"#,
    )
    .unwrap();

    let config = isolated(&dir)
        .load_with(env(&[
            ("RISKFUSE_CONFIG_PATH", path.to_str().unwrap()),
            ("RISKFUSE_BASE_URL", "http://from-env:8000"),
            ("RISKFUSE_CONCURRENCY", "9"),
            ("RISKFUSE_TIMEOUT", "5s"),
            ("RISKFUSE_FUSION_POLICY", "two-signal"),
            ("RISKFUSE_HISTORY_DIR", "/tmp/riskfuse-history"),
            ("RISKFUSE_API_KEY", "k-123"),
        ]))
        .unwrap();

    assert_eq!(config.signal.base_url, "http://from-env:8000");
    assert_eq!(config.batch.concurrency_limit.get(), 9);
    assert_eq!(config.signal.request_timeout, Duration::from_secs(5));
    assert_eq!(config.fusion, FusionPolicy::two_signal());
    assert_eq!(config.history.dir, PathBuf::from("/tmp/riskfuse-history"));
    assert_eq!(config.signal.api_key.as_deref(), Some("k-123"));
    assert_eq!(config.metadata.source, ConfigSource::EnvPath(path));
    assert!(config.metadata.env_overrides.contains(&"RISKFUSE_CONCURRENCY"));
    assert_eq!(config.metadata.env_overrides.len(), 6);
}

#[test]
fn out_of_range_concurrency_is_rejected() {
    let dir = TempDir::new().unwrap();
    let err = isolated(&dir)
        .load_with(env(&[("RISKFUSE_CONCURRENCY", "25")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::InvalidValue {
            field: "concurrency_limit",
            ..
        }
    ));
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = isolated(&dir)
        .with_config_path(dir.path().join("nope.toml"))
        .load_with(env(&[]))
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("riskfuse.toml");
    fs::write(&path, "[batch\nconcurrency_limit = ").unwrap();

    let err = isolated(&dir).load_with(env(&[])).unwrap_err();
    match err {
        ConfigLoadError::Parse { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn env_file_is_optional() {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::new()
        .with_search_dir(dir.path())
        .with_env_file(dir.path().join("missing.env"));
    let config = loader.load().unwrap();
    assert!(!config.metadata.env_file_loaded);
}

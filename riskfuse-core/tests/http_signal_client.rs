use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, serve};
use riskfuse_core::model::{
    CombinedLabel, ConcurrencyLimit, FileDescriptor, JobState, RemotePath, SignalStage,
};
use riskfuse_core::{
    BatchOrchestrator, FusionEngine, HttpSignalClient, HttpSignalSettings, NullObserver,
    ScanPipeline, SignalClient, TransportErrorKind,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct Calls {
    uploads: Arc<AtomicUsize>,
    keyed: Arc<AtomicUsize>,
}

async fn upload(State(calls): State<Calls>, headers: HeaderMap, body: Bytes) -> Json<Value> {
    calls.uploads.fetch_add(1, Ordering::SeqCst);
    if headers.get("x-api-key").is_some_and(|v| v == "secret") {
        calls.keyed.fetch_add(1, Ordering::SeqCst);
    }
    let name = headers
        .get("x-file-name")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| urlencoding::decode(v).ok())
        .map(|v| v.into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    Json(json!({ "path": format!("uploads/{name}-{}", body.len()) }))
}

async fn reputation(Json(request): Json<Value>) -> Json<Value> {
    let path = request["path"].as_str().unwrap_or_default();
    Json(json!({
        "sha256": format!("sha-of-{path}"),
        "results": {
            "reputation": {
                "analysis_stats": {
                    "harmless": 60, "undetected": 30, "malicious": 10, "suspicious": 0
                },
                "threat_name": null,
                "type_description": "Win32 EXE"
            },
            "malwareReputation": { "detected": false }
        }
    }))
}

async fn classify(_body: Bytes) -> Json<Value> {
    Json(json!({ "label": "malware", "score": "0.9", "family": "agenttesla" }))
}

async fn combined(_body: Bytes) -> Json<Value> {
    Json(json!({ "label": "Malicious", "file_type": "pe", "classifier": "ember" }))
}

async fn bad_gateway() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "upstream down")
}

async fn garbage() -> &'static str {
    "definitely not json"
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "path": "late" }))
}

fn scanner(calls: Calls) -> Router {
    Router::new()
        .route("/files/upload", post(upload))
        .route("/hash/scan", post(reputation))
        .route("/ember/", post(classify))
        .route("/combined/", post(combined))
        .route("/broken", post(bad_gateway))
        .route("/garbage", post(garbage))
        .route("/slow", post(slow))
        .with_state(calls)
}

async fn spawn_server(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: String) -> HttpSignalClient {
    HttpSignalClient::new(HttpSignalSettings {
        base_url,
        api_key: Some("secret".into()),
        request_timeout: Duration::from_millis(500),
        ..HttpSignalSettings::default()
    })
    .unwrap()
}

fn sample() -> (FileDescriptor, Arc<[u8]>) {
    let bytes: Arc<[u8]> = Arc::from(&b"MZ\x90\x00payload"[..]);
    (FileDescriptor::in_memory("sample.exe", Arc::clone(&bytes)), bytes)
}

#[tokio::test]
async fn every_operation_decodes_its_wire_format() {
    let calls = Calls::default();
    let base = spawn_server(scanner(calls.clone())).await;
    let client = client(base);
    let (file, bytes) = sample();

    let path = client.upload(&file, Arc::clone(&bytes)).await.unwrap();
    assert_eq!(path.as_str(), format!("uploads/sample.exe-{}", bytes.len()));
    assert_eq!(calls.keyed.load(Ordering::SeqCst), 1);

    let reputation = client.reputation_scan(&path).await.unwrap();
    assert_eq!(reputation.stats.malicious, 10);
    assert_eq!(reputation.stats.total(), 100);
    assert_eq!(reputation.sha256.as_deref(), Some(&*format!("sha-of-{}", path.as_str())));
    assert!(reputation.malware.is_some_and(|m| !m.detected && m.threat_level.is_none()));

    let ml = client.classify(&file, Arc::clone(&bytes)).await.unwrap();
    assert_eq!(ml.score.value(), Some(0.9));
    assert_eq!(ml.family.as_deref(), Some("agenttesla"));

    let combined = client.combined_classify(&file, bytes).await.unwrap();
    assert_eq!(combined.label, CombinedLabel::Malicious);
    assert_eq!(combined.file_type.as_deref(), Some("pe"));
}

#[tokio::test]
async fn non_ascii_file_names_reach_the_service_intact() {
    let base = spawn_server(scanner(Calls::default())).await;
    let client = client(base);
    let bytes: Arc<[u8]> = Arc::from(&b"MZ-resume"[..]);
    let file = FileDescriptor::in_memory("résumé 2024.exe", Arc::clone(&bytes));

    let path = client.upload(&file, bytes).await.unwrap();
    assert_eq!(path.as_str(), "uploads/résumé 2024.exe-9");
}

#[tokio::test]
async fn non_success_status_is_tagged_with_the_stage() {
    let base = spawn_server(scanner(Calls::default())).await;
    let mut settings = HttpSignalSettings {
        base_url: base,
        ..HttpSignalSettings::default()
    };
    settings.endpoints.reputation = "/broken".into();
    let client = HttpSignalClient::new(settings).unwrap();

    let err = client
        .reputation_scan(&RemotePath::new("uploads/x"))
        .await
        .unwrap_err();
    assert_eq!(err.stage, SignalStage::Reputation);
    assert_eq!(
        err.kind,
        TransportErrorKind::Status {
            status: 502,
            body: "upstream down".into()
        }
    );
    assert_eq!(err.to_string(), "reputation: HTTP 502: upstream down");
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let base = spawn_server(scanner(Calls::default())).await;
    let mut settings = HttpSignalSettings {
        base_url: base,
        ..HttpSignalSettings::default()
    };
    settings.endpoints.classify = "/garbage".into();
    let client = HttpSignalClient::new(settings).unwrap();
    let (file, bytes) = sample();

    let err = client.classify(&file, bytes).await.unwrap_err();
    assert_eq!(err.stage, SignalStage::Classify);
    assert!(matches!(err.kind, TransportErrorKind::Decode(_)));
}

#[tokio::test]
async fn request_timeout_surfaces_as_transport_error() {
    let base = spawn_server(scanner(Calls::default())).await;
    let mut settings = HttpSignalSettings {
        base_url: base,
        request_timeout: Duration::from_millis(100),
        ..HttpSignalSettings::default()
    };
    settings.endpoints.upload = "/slow".into();
    let client = HttpSignalClient::new(settings).unwrap();
    let (file, bytes) = sample();

    let err = client.upload(&file, bytes).await.unwrap_err();
    assert_eq!(err.stage, SignalStage::Upload);
    assert_eq!(err.kind, TransportErrorKind::Timeout);
}

#[tokio::test]
async fn unreachable_service_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(format!("http://{addr}"));
    let (file, bytes) = sample();
    let err = client.upload(&file, bytes).await.unwrap_err();
    assert_eq!(err.stage, SignalStage::Upload);
    assert!(matches!(
        err.kind,
        TransportErrorKind::Network(_) | TransportErrorKind::Timeout
    ));
}

#[tokio::test]
async fn batch_over_http_scores_every_file() {
    let calls = Calls::default();
    let base = spawn_server(scanner(calls.clone())).await;
    let pipeline = ScanPipeline::new(Arc::new(client(base)), FusionEngine::default());
    let orchestrator = BatchOrchestrator::new(Arc::new(pipeline));

    let files = (0..5)
        .map(|i| FileDescriptor::in_memory(format!("f{i}.bin"), vec![i as u8; 64]))
        .collect();
    let report = orchestrator
        .run_batch(
            files,
            ConcurrencyLimit::new(2).unwrap(),
            &NullObserver,
            CancellationToken::new(),
        )
        .await;

    assert_eq!(calls.uploads.load(Ordering::SeqCst), 5);
    assert_eq!(report.summary.completed, 5);
    for job in &report.jobs {
        assert_eq!(job.state(), JobState::Completed);
        assert_eq!(job.score().map(|s| s.value()), Some(51));
        assert!(job.sha256().is_some_and(|h| h.len() == 64));
    }
}

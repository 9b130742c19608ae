use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response, header};
use riskfuse_model::{
    AnalysisStats, CombinedLabel, CombinedReport, FileDescriptor, MalwareReputation,
    MlReport, MlScore, RemotePath, ReputationReport, SignalStage, ThreatLevel,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FileBytes, SignalClient};
use crate::error::TransportError;

/// Longest error body kept in a transport error message.
const MAX_ERROR_BODY: usize = 512;

/// Relative paths of the four remote operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalEndpoints {
    pub upload: String,
    pub reputation: String,
    pub classify: String,
    pub combined: String,
}

impl Default for SignalEndpoints {
    fn default() -> Self {
        Self {
            upload: "/files/upload".into(),
            reputation: "/hash/scan".into(),
            classify: "/ember/".into(),
            combined: "/combined/".into(),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct HttpSignalSettings {
    pub base_url: String,
    pub endpoints: SignalEndpoints,
    /// Applied to every request; expiry surfaces as a transport error.
    pub request_timeout: Duration,
    pub api_key: Option<String>,
}

impl fmt::Debug for HttpSignalSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSignalSettings")
            .field("base_url", &self.base_url)
            .field("endpoints", &self.endpoints)
            .field("request_timeout", &self.request_timeout)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for HttpSignalSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".into(),
            endpoints: SignalEndpoints::default(),
            request_timeout: Duration::from_secs(30),
            api_key: None,
        }
    }
}

/// [`SignalClient`] speaking JSON over HTTP to the scan services.
#[derive(Debug, Clone)]
pub struct HttpSignalClient {
    client: Client,
    settings: HttpSignalSettings,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "file_path")]
    path: String,
}

#[derive(Debug, Serialize)]
struct ReputationRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReputationResponse {
    #[serde(default)]
    sha256: Option<String>,
    results: ReputationResults,
}

#[derive(Debug, Deserialize)]
struct ReputationResults {
    reputation: WireReputation,
    #[serde(default, rename = "malwareReputation")]
    malware_reputation: Option<WireMalwareReputation>,
}

#[derive(Debug, Deserialize)]
struct WireReputation {
    #[serde(default)]
    analysis_stats: AnalysisStats,
    #[serde(default)]
    threat_name: Option<String>,
    #[serde(default)]
    type_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMalwareReputation {
    #[serde(default)]
    detected: bool,
    #[serde(default)]
    threat_level: Option<String>,
    #[serde(default)]
    threat_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: String,
    score: MlScore,
    #[serde(default)]
    family: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CombinedResponse {
    label: String,
    #[serde(default)]
    file_type: Option<String>,
    #[serde(default)]
    classifier: Option<String>,
}

fn parse_threat_level(raw: &str) -> Option<ThreatLevel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "low" => Some(ThreatLevel::Low),
        "medium" => Some(ThreatLevel::Medium),
        "high" => Some(ThreatLevel::High),
        _ => None,
    }
}

impl From<ReputationResponse> for ReputationReport {
    fn from(response: ReputationResponse) -> Self {
        let ReputationResponse { sha256, results } = response;
        ReputationReport {
            sha256,
            stats: results.reputation.analysis_stats,
            threat_name: results.reputation.threat_name,
            type_description: results.reputation.type_description,
            malware: results.malware_reputation.map(|wire| MalwareReputation {
                detected: wire.detected,
                threat_level: wire.threat_level.as_deref().and_then(parse_threat_level),
                threat_name: wire.threat_name,
            }),
        }
    }
}

impl HttpSignalClient {
    pub fn new(settings: HttpSignalSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &HttpSignalSettings {
        &self.settings
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.post(self.url(path));
        match &self.settings.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    fn post_bytes(
        &self,
        path: &str,
        file: &FileDescriptor,
        bytes: &FileBytes,
    ) -> reqwest::RequestBuilder {
        // Header values must be visible ASCII.
        self.post(path)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header("x-file-name", urlencoding::encode(file.name()).into_owned())
            .body(Bytes::from_owner(FileBytes::clone(bytes)))
    }

    async fn send<T: DeserializeOwned>(
        stage: SignalStage,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(stage, e))?;
        Self::decode(stage, response).await
    }

    async fn decode<T: DeserializeOwned>(
        stage: SignalStage,
        response: Response,
    ) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(TransportError::status(stage, status.as_u16(), body));
        }

        let raw = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(stage, e))?;
        serde_json::from_slice(&raw).map_err(|e| TransportError::decode(stage, e.to_string()))
    }
}

#[async_trait]
impl SignalClient for HttpSignalClient {
    async fn upload(
        &self,
        file: &FileDescriptor,
        bytes: FileBytes,
    ) -> Result<RemotePath, TransportError> {
        let request = self.post_bytes(&self.settings.endpoints.upload, file, &bytes);
        let response: UploadResponse = Self::send(SignalStage::Upload, request).await?;
        if response.path.trim().is_empty() {
            return Err(TransportError::decode(
                SignalStage::Upload,
                "upload response carried an empty path",
            ));
        }
        debug!(file = file.name(), path = %response.path, "uploaded");
        Ok(RemotePath::new(response.path))
    }

    async fn reputation_scan(
        &self,
        path: &RemotePath,
    ) -> Result<ReputationReport, TransportError> {
        let request = self
            .post(&self.settings.endpoints.reputation)
            .json(&ReputationRequest { path: path.as_str() });
        let response: ReputationResponse =
            Self::send(SignalStage::Reputation, request).await?;
        Ok(response.into())
    }

    async fn classify(
        &self,
        file: &FileDescriptor,
        bytes: FileBytes,
    ) -> Result<MlReport, TransportError> {
        let request = self.post_bytes(&self.settings.endpoints.classify, file, &bytes);
        let response: ClassifyResponse = Self::send(SignalStage::Classify, request).await?;
        Ok(MlReport {
            label: response.label,
            score: response.score,
            family: response.family,
        })
    }

    async fn combined_classify(
        &self,
        file: &FileDescriptor,
        bytes: FileBytes,
    ) -> Result<CombinedReport, TransportError> {
        let request = self.post_bytes(&self.settings.endpoints.combined, file, &bytes);
        let response: CombinedResponse = Self::send(SignalStage::Combined, request).await?;
        Ok(CombinedReport {
            label: CombinedLabel::from(response.label),
            file_type: response.file_type,
            classifier: response.classifier,
        })
    }
}

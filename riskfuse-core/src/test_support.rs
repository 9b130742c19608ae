use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use riskfuse_model::{
    AnalysisStats, CombinedLabel, CombinedReport, FileDescriptor, JobState, MlReport,
    RemotePath, ReputationReport, ScanJob, SignalStage,
};

use crate::error::TransportError;
use crate::events::{BatchObserver, JobObserver};
use crate::orchestrator::BatchSummary;
use crate::signal::{FileBytes, SignalClient};

/// Signal client returning canned reports (fusing to 51) with optional
/// per-file failures and an artificial upload delay.
#[derive(Debug, Default)]
pub(crate) struct StubSignalClient {
    pub uploads: AtomicUsize,
    pub reputation_calls: AtomicUsize,
    pub classify_calls: AtomicUsize,
    pub combined_calls: AtomicUsize,
    delay: Duration,
    failures: HashMap<String, SignalStage>,
}

impl StubSignalClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, name: &str, stage: SignalStage) -> Self {
        self.failures.insert(name.to_string(), stage);
        self
    }

    fn check(&self, name: &str, stage: SignalStage) -> Result<(), TransportError> {
        match self.failures.get(name) {
            Some(failing) if *failing == stage => {
                Err(TransportError::status(stage, 500, "stub failure"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl SignalClient for StubSignalClient {
    async fn upload(
        &self,
        file: &FileDescriptor,
        _bytes: FileBytes,
    ) -> Result<RemotePath, TransportError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.check(file.name(), SignalStage::Upload)?;
        Ok(RemotePath::new(file.name()))
    }

    async fn reputation_scan(
        &self,
        path: &RemotePath,
    ) -> Result<ReputationReport, TransportError> {
        self.reputation_calls.fetch_add(1, Ordering::SeqCst);
        self.check(path.as_str(), SignalStage::Reputation)?;
        Ok(ReputationReport {
            sha256: Some(format!("remote-{}", path.as_str())),
            stats: AnalysisStats {
                harmless: 60,
                undetected: 30,
                malicious: 10,
                suspicious: 0,
            },
            ..ReputationReport::default()
        })
    }

    async fn classify(
        &self,
        file: &FileDescriptor,
        _bytes: FileBytes,
    ) -> Result<MlReport, TransportError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.check(file.name(), SignalStage::Classify)?;
        Ok(MlReport {
            label: "malware".into(),
            score: "0.9".into(),
            family: None,
        })
    }

    async fn combined_classify(
        &self,
        file: &FileDescriptor,
        _bytes: FileBytes,
    ) -> Result<CombinedReport, TransportError> {
        self.combined_calls.fetch_add(1, Ordering::SeqCst);
        self.check(file.name(), SignalStage::Combined)?;
        Ok(CombinedReport {
            label: CombinedLabel::Malicious,
            file_type: Some("pe".into()),
            classifier: Some("stub".into()),
        })
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingObserver {
    updates: Mutex<Vec<(usize, JobState)>>,
    progress: Mutex<Vec<(usize, usize)>>,
    summary: Mutex<Option<BatchSummary>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<(usize, JobState)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn progress_updates(&self) -> Vec<(usize, usize)> {
        self.progress.lock().unwrap().clone()
    }

    pub fn summary(&self) -> Option<BatchSummary> {
        self.summary.lock().unwrap().clone()
    }
}

impl JobObserver for RecordingObserver {
    fn job_updated(&self, index: usize, job: &ScanJob) {
        self.updates.lock().unwrap().push((index, job.state()));
    }
}

impl BatchObserver for RecordingObserver {
    fn progress(&self, processed: usize, total: usize) {
        self.progress.lock().unwrap().push((processed, total));
    }

    fn finished(&self, summary: &BatchSummary) {
        *self.summary.lock().unwrap() = Some(summary.clone());
    }
}

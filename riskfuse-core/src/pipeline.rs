//! Per-file scan pipeline: read, upload, then the three analysis calls
//! concurrently, then fusion.

use std::sync::Arc;

use riskfuse_model::{FileDescriptor, FileSource, ScanJob, SignalSet, SignalStage};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::events::JobObserver;
use crate::fusion::FusionEngine;
use crate::signal::{FileBytes, SignalClient};

/// Error message recorded on jobs abandoned by cancellation.
pub const CANCELLED_REASON: &str = "scan cancelled";

/// Load the file contents once so every call of the job can share them.
pub async fn read_file_bytes(file: &FileDescriptor) -> Result<FileBytes, TransportError> {
    match file.source() {
        FileSource::Memory(bytes) => Ok(Arc::clone(bytes)),
        FileSource::Path(path) => tokio::fs::read(path)
            .await
            .map(FileBytes::from)
            .map_err(|e| TransportError::io(SignalStage::Read, &e)),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

enum Interrupted {
    Failed(TransportError),
    Cancelled,
}

#[derive(Clone)]
pub struct ScanPipeline {
    client: Arc<dyn SignalClient>,
    fusion: FusionEngine,
}

impl std::fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("fusion", &self.fusion)
            .finish_non_exhaustive()
    }
}

impl ScanPipeline {
    pub fn new(client: Arc<dyn SignalClient>, fusion: FusionEngine) -> Self {
        Self { client, fusion }
    }

    pub fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }

    /// Drive one queued job to a terminal state. Every transition is
    /// reported to `observer`; jobs that are not queued are left untouched.
    pub async fn run(
        &self,
        index: usize,
        job: &mut ScanJob,
        observer: &dyn JobObserver,
        cancel: &CancellationToken,
    ) {
        if cancel.is_cancelled() {
            if job.fail(CANCELLED_REASON) {
                observer.job_updated(index, job);
            }
            return;
        }
        if !job.start() {
            return;
        }
        observer.job_updated(index, job);

        let outcome = match read_file_bytes(job.file()).await {
            Ok(bytes) => {
                job.set_sha256(sha256_hex(&bytes));
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Interrupted::Cancelled),
                    collected = self.collect(job.file(), bytes) => {
                        collected.map_err(Interrupted::Failed)
                    }
                }
            }
            Err(err) => Err(Interrupted::Failed(err)),
        };

        match outcome {
            Ok(signals) => {
                job.record_signals(signals);
                let fused = self.fusion.fuse(job.signals());
                debug!(
                    index,
                    file = job.file().name(),
                    score = fused.score.value(),
                    label = %fused.label,
                    "job completed"
                );
                job.complete(fused.score);
            }
            Err(Interrupted::Failed(err)) => {
                warn!(index, file = job.file().name(), stage = %err.stage, error = %err, "job failed");
                job.fail(err.to_string());
            }
            Err(Interrupted::Cancelled) => {
                debug!(index, file = job.file().name(), "job cancelled in flight");
                job.fail(CANCELLED_REASON);
            }
        }
        observer.job_updated(index, job);
    }

    async fn collect(
        &self,
        file: &FileDescriptor,
        bytes: FileBytes,
    ) -> Result<SignalSet, TransportError> {
        let path = self.client.upload(file, Arc::clone(&bytes)).await?;
        debug!(file = file.name(), %path, "upload complete, fanning out");

        let (reputation, ml, combined) = tokio::try_join!(
            self.client.reputation_scan(&path),
            self.client.classify(file, Arc::clone(&bytes)),
            self.client.combined_classify(file, bytes),
        )?;

        Ok(SignalSet::new(Some(reputation), Some(ml), Some(combined)))
    }
}

//! Wave-based batch scheduler.
//!
//! Files are split into consecutive waves of at most `limit` jobs. All jobs
//! of a wave run concurrently and the whole wave drains before the next one
//! starts, so no more than `limit` pipelines are ever in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use riskfuse_model::{
    BatchState, ConcurrencyLimit, FileDescriptor, HistoryEntry, JobState, ScanJob,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::{BatchEvent, BatchObserver, InProcBatchEventBus};
use crate::history::HistoryStore;
use crate::pipeline::{CANCELLED_REASON, ScanPipeline};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: Uuid,
    pub total: usize,
    pub processed: usize,
    pub completed: usize,
    pub errored: usize,
    pub concurrency_limit: ConcurrencyLimit,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Final state of every job, in submission order, plus the batch summary.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub jobs: Vec<ScanJob>,
    pub summary: BatchSummary,
}

#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    pipeline: Arc<ScanPipeline>,
    history: Option<Arc<HistoryStore>>,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Arc<ScanPipeline>) -> Self {
        Self {
            pipeline,
            history: None,
        }
    }

    /// Persist every finished batch to `history`.
    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn history(&self) -> Option<&Arc<HistoryStore>> {
        self.history.as_ref()
    }

    pub async fn run_batch(
        &self,
        files: Vec<FileDescriptor>,
        limit: ConcurrencyLimit,
        observer: &dyn BatchObserver,
        cancel: CancellationToken,
    ) -> BatchReport {
        let batch_id = Uuid::now_v7();
        let started_at = Utc::now();
        let mut state = BatchState::new(files.len(), limit);
        let mut jobs: Vec<ScanJob> = files.into_iter().map(ScanJob::new).collect();
        let total = state.total;
        let processed = AtomicUsize::new(0);

        info!(
            %batch_id,
            files = total,
            limit = limit.get(),
            waves = state.wave_count(),
            "batch started"
        );

        let finish = |index: usize, job: &ScanJob| {
            debug_assert!(job.state().is_terminal());
            let done = processed.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(%batch_id, index, state = %job.state(), done, total, "job finished");
            observer.progress(done, total);
        };

        for (wave_index, wave) in jobs.chunks_mut(limit.get()).enumerate() {
            let offset = wave_index * limit.get();

            if cancel.is_cancelled() {
                for (slot, job) in wave.iter_mut().enumerate() {
                    if job.fail(CANCELLED_REASON) {
                        observer.job_updated(offset + slot, job);
                        finish(offset + slot, job);
                    }
                }
                continue;
            }

            debug!(%batch_id, wave = wave_index, size = wave.len(), "wave started");
            let cancel = &cancel;
            let finish = &finish;
            let runs = wave.iter_mut().enumerate().map(|(slot, job)| async move {
                let index = offset + slot;
                self.pipeline.run(index, job, observer, cancel).await;
                finish(index, job);
            });
            join_all(runs).await;
        }

        state.processed = processed.load(Ordering::SeqCst);
        let finished_at = Utc::now();
        let completed = jobs
            .iter()
            .filter(|job| job.state() == JobState::Completed)
            .count();
        let errored = jobs
            .iter()
            .filter(|job| job.state() == JobState::Error)
            .count();

        if let Some(history) = &self.history {
            let entries: Vec<HistoryEntry> = jobs
                .iter()
                .filter_map(|job| HistoryEntry::from_job(job, finished_at))
                .collect();
            history.append(entries).await;
        }

        let summary = BatchSummary {
            batch_id,
            total,
            processed: state.processed,
            completed,
            errored,
            concurrency_limit: state.concurrency_limit,
            cancelled: cancel.is_cancelled(),
            started_at,
            finished_at,
        };
        info!(
            %batch_id,
            completed,
            errored,
            cancelled = summary.cancelled,
            finished = state.is_finished(),
            "batch finished"
        );
        observer.finished(&summary);

        BatchReport { jobs, summary }
    }

    /// Spawn a batch on the runtime and hand back its event stream.
    ///
    /// The stream is subscribed before the batch starts, so no event is
    /// missed; it ends after [`BatchEvent::Finished`] once the bus drops.
    pub fn start_batch(
        &self,
        files: Vec<FileDescriptor>,
        limit: ConcurrencyLimit,
        cancel: CancellationToken,
    ) -> (JoinHandle<BatchReport>, BroadcastStream<BatchEvent>) {
        let bus = InProcBatchEventBus::new(
            InProcBatchEventBus::DEFAULT_CAPACITY.max(files.len() * 4 + 1),
        );
        let stream = bus.stream();
        let orchestrator = self.clone();
        let handle = tokio::spawn(async move {
            orchestrator.run_batch(files, limit, &bus, cancel).await
        });
        (handle, stream)
    }
}

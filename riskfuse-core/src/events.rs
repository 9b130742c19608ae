use std::fmt;

use riskfuse_model::ScanJob;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::orchestrator::BatchSummary;

/// Receives a snapshot of a job on every state change.
pub trait JobObserver: Send + Sync {
    fn job_updated(&self, index: usize, job: &ScanJob);
}

/// Upward notification surface of a running batch.
pub trait BatchObserver: JobObserver {
    /// `processed` increases by exactly one per finished job.
    fn progress(&self, processed: usize, total: usize);

    fn finished(&self, summary: &BatchSummary);
}

/// Observer that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl JobObserver for NullObserver {
    fn job_updated(&self, _index: usize, _job: &ScanJob) {}
}

impl BatchObserver for NullObserver {
    fn progress(&self, _processed: usize, _total: usize) {}

    fn finished(&self, _summary: &BatchSummary) {}
}

#[derive(Debug, Clone)]
pub enum BatchEvent {
    JobUpdated { index: usize, job: ScanJob },
    Progress { processed: usize, total: usize },
    Finished(BatchSummary),
}

impl BatchEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, BatchEvent::Finished(_))
    }
}

/// In-process fan-out of batch notifications to any number of subscribers.
/// Publishing never blocks; lagging subscribers lose the oldest events.
pub struct InProcBatchEventBus {
    sender: broadcast::Sender<BatchEvent>,
    capacity: usize,
}

impl fmt::Debug for InProcBatchEventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InProcBatchEventBus")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

impl InProcBatchEventBus {
    pub const DEFAULT_CAPACITY: usize = 256;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> BroadcastStream<BatchEvent> {
        BroadcastStream::new(self.subscribe())
    }

    pub fn publish(&self, event: BatchEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}

impl Default for InProcBatchEventBus {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

impl JobObserver for InProcBatchEventBus {
    fn job_updated(&self, index: usize, job: &ScanJob) {
        self.publish(BatchEvent::JobUpdated {
            index,
            job: job.clone(),
        });
    }
}

impl BatchObserver for InProcBatchEventBus {
    fn progress(&self, processed: usize, total: usize) {
        self.publish(BatchEvent::Progress { processed, total });
    }

    fn finished(&self, summary: &BatchSummary) {
        self.publish(BatchEvent::Finished(summary.clone()));
    }
}

//! Batch scan orchestration and multi-signal risk scoring.
#![allow(missing_docs)]

pub mod error;
pub mod events;
pub mod fusion;
pub mod history;
pub mod orchestrator;
pub mod pipeline;
pub mod signal;

#[cfg(test)]
mod test_support;

pub use error::{
    FusionInputError, PersistenceError, TransportError, TransportErrorKind,
};
pub use events::{
    BatchEvent, BatchObserver, InProcBatchEventBus, JobObserver, NullObserver,
};
pub use fusion::{FusionEngine, FusionOutcome, FusionPolicy, SubScores, fuse};
pub use history::{
    CacacheHistoryBackend, HistoryBackend, HistoryStore, MemoryHistoryBackend,
};
pub use orchestrator::{BatchOrchestrator, BatchReport, BatchSummary};
pub use pipeline::{CANCELLED_REASON, ScanPipeline};
pub use signal::{
    FileBytes, HttpSignalClient, HttpSignalSettings, SignalClient, SignalEndpoints,
};

pub use riskfuse_model as model;

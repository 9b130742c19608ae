//! Core data model definitions shared across riskfuse crates.
#![allow(missing_docs)]

pub mod error;
pub mod file;
pub mod history;
pub mod job;
pub mod signal;
pub mod verdict;

pub use error::{ModelError, Result as ModelResult};
pub use file::{FileDescriptor, FileSource};
pub use history::{
    DateWindow, HistoryEntry, HistoryEntryId, HistoryFilter, HistoryStats,
    HistoryStatus, ScoreBand, StatusTab,
};
pub use job::{BatchState, ConcurrencyLimit, JobState, ScanJob};
pub use signal::{
    AnalysisStats, CombinedLabel, CombinedReport, MalwareReputation, MlReport,
    MlScore, RemotePath, ReputationReport, SignalSet, SignalStage, ThreatLevel,
};
pub use verdict::{RiskLabel, RiskScore};

use std::fmt;

use crate::error::{ModelError, Result};
use crate::file::FileDescriptor;
use crate::signal::SignalSet;
use crate::verdict::{RiskLabel, RiskScore};

/// Lifecycle of a single file inside a batch.
///
/// `Queued -> Processing -> {Completed, Error}`; both outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Error)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Processing => write!(f, "processing"),
            JobState::Completed => write!(f, "completed"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// Per-file record mutated only by the pipeline that owns it.
///
/// The score is present if and only if the job is `Completed`; the error
/// message only when it is `Error`. Transitions out of a terminal state are
/// ignored so a final state is written at most once.
#[derive(Debug, Clone)]
pub struct ScanJob {
    file: FileDescriptor,
    state: JobState,
    signals: SignalSet,
    sha256: Option<String>,
    score: Option<RiskScore>,
    error: Option<String>,
}

impl ScanJob {
    pub fn new(file: FileDescriptor) -> Self {
        Self {
            file,
            state: JobState::Queued,
            signals: SignalSet::default(),
            sha256: None,
            score: None,
            error: None,
        }
    }

    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn signals(&self) -> &SignalSet {
        &self.signals
    }

    pub fn score(&self) -> Option<RiskScore> {
        self.score
    }

    pub fn label(&self) -> Option<RiskLabel> {
        self.score.map(|score| score.label())
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Locally computed digest, falling back to the reputation service's hash.
    pub fn sha256(&self) -> Option<&str> {
        self.sha256.as_deref().or_else(|| self.signals.sha256())
    }

    pub fn set_sha256(&mut self, digest: impl Into<String>) {
        self.sha256 = Some(digest.into());
    }

    /// Returns `false` when the job was not queued.
    pub fn start(&mut self) -> bool {
        if self.state != JobState::Queued {
            return false;
        }
        self.state = JobState::Processing;
        true
    }

    pub fn record_signals(&mut self, signals: SignalSet) {
        if !self.state.is_terminal() {
            self.signals = signals;
        }
    }

    pub fn complete(&mut self, score: RiskScore) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Completed;
        self.score = Some(score);
        self.error = None;
        true
    }

    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = JobState::Error;
        self.score = None;
        self.error = Some(message.into());
        true
    }
}

/// Number of scan pipelines allowed to run at once, always within `1..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "usize", into = "usize"))]
pub struct ConcurrencyLimit(usize);

impl ConcurrencyLimit {
    pub const MIN: usize = 1;
    pub const MAX: usize = 10;
    pub const DEFAULT: ConcurrencyLimit = ConcurrencyLimit(3);

    pub fn new(limit: usize) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&limit) {
            Ok(Self(limit))
        } else {
            Err(ModelError::ConcurrencyOutOfRange(limit))
        }
    }

    pub fn get(&self) -> usize {
        self.0
    }
}

impl Default for ConcurrencyLimit {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for ConcurrencyLimit {
    type Error = ModelError;

    fn try_from(limit: usize) -> Result<Self> {
        Self::new(limit)
    }
}

impl From<ConcurrencyLimit> for usize {
    fn from(limit: ConcurrencyLimit) -> Self {
        limit.0
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate progress of one batch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BatchState {
    pub total: usize,
    pub processed: usize,
    pub concurrency_limit: ConcurrencyLimit,
}

impl BatchState {
    pub fn new(total: usize, concurrency_limit: ConcurrencyLimit) -> Self {
        Self {
            total,
            processed: 0,
            concurrency_limit,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.processed >= self.total
    }

    /// Number of waves needed to drain `total` jobs at this limit.
    pub fn wave_count(&self) -> usize {
        self.total.div_ceil(self.concurrency_limit.get())
    }
}

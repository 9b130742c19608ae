//! Persisted scan records and the predicates used to search them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Months, Utc};
use uuid::Uuid;

use crate::error::ModelError;
use crate::job::{JobState, ScanJob};
use crate::signal::SignalSet;
use crate::verdict::{RiskLabel, RiskScore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct HistoryEntryId(pub Uuid);

impl Default for HistoryEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryEntryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for HistoryEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for HistoryEntryId {
    type Err = uuid::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(raw.trim()).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum HistoryStatus {
    Completed,
    Error,
}

/// Immutable snapshot of a finished scan job.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub timestamp: DateTime<Utc>,
    pub file_name: String,
    pub file_size: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sha256: Option<String>,
    pub status: HistoryStatus,
    #[cfg_attr(feature = "serde", serde(default))]
    pub score: Option<RiskScore>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub label: Option<RiskLabel>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub error: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub signals: SignalSet,
}

impl HistoryEntry {
    /// Snapshot a job that reached a terminal state; `None` otherwise.
    pub fn from_job(job: &ScanJob, timestamp: DateTime<Utc>) -> Option<Self> {
        let status = match job.state() {
            JobState::Completed => HistoryStatus::Completed,
            JobState::Error => HistoryStatus::Error,
            JobState::Queued | JobState::Processing => return None,
        };

        let (score, error) = match status {
            HistoryStatus::Completed => (job.score(), None),
            HistoryStatus::Error => (None, job.error().map(str::to_string)),
        };

        Some(Self {
            id: HistoryEntryId::new(),
            timestamp,
            file_name: job.file().name().to_string(),
            file_size: job.file().size(),
            sha256: job.sha256().map(str::to_string),
            status,
            score,
            label: score.map(|score| score.label()),
            error,
            signals: job.signals().clone(),
        })
    }

    pub fn is_error(&self) -> bool {
        self.status == HistoryStatus::Error
    }

    /// Risk band of a completed entry. Errored entries have none.
    pub fn band(&self) -> Option<RiskLabel> {
        match self.status {
            HistoryStatus::Completed => self.score.map(|score| score.label()),
            HistoryStatus::Error => None,
        }
    }
}

fn parse_keyword<T: Copy>(
    raw: &str,
    kind: &str,
    table: &[(&str, T)],
) -> Result<T, ModelError> {
    let needle = raw.trim().to_ascii_lowercase();
    table
        .iter()
        .find(|(name, _)| *name == needle)
        .map(|(_, value)| *value)
        .ok_or_else(|| ModelError::InvalidFilter(format!("unknown {kind} '{raw}'")))
}

/// History tab: either a score band or the failed-scan bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StatusTab {
    #[default]
    All,
    Clean,
    Suspicious,
    Malicious,
    Failed,
}

impl StatusTab {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        match self {
            StatusTab::All => true,
            StatusTab::Clean => entry.band() == Some(RiskLabel::Clean),
            StatusTab::Suspicious => entry.band() == Some(RiskLabel::Suspicious),
            StatusTab::Malicious => entry.band() == Some(RiskLabel::Malicious),
            StatusTab::Failed => entry.is_error(),
        }
    }
}

impl FromStr for StatusTab {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_keyword(
            raw,
            "status tab",
            &[
                ("all", StatusTab::All),
                ("clean", StatusTab::Clean),
                ("suspicious", StatusTab::Suspicious),
                ("malicious", StatusTab::Malicious),
                ("failed", StatusTab::Failed),
            ],
        )
    }
}

/// Score-only filter, independent of the status tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ScoreBand {
    #[default]
    All,
    Clean,
    Suspicious,
    Malicious,
}

impl ScoreBand {
    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        let wanted = match self {
            ScoreBand::All => return true,
            ScoreBand::Clean => RiskLabel::Clean,
            ScoreBand::Suspicious => RiskLabel::Suspicious,
            ScoreBand::Malicious => RiskLabel::Malicious,
        };
        entry.band() == Some(wanted)
    }
}

impl FromStr for ScoreBand {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_keyword(
            raw,
            "score band",
            &[
                ("all", ScoreBand::All),
                ("clean", ScoreBand::Clean),
                ("suspicious", ScoreBand::Suspicious),
                ("malicious", ScoreBand::Malicious),
            ],
        )
    }
}

/// Lower bound on entry timestamps, relative to "now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DateWindow {
    /// Since midnight UTC of the current day.
    Today,
    /// The last seven days.
    Week,
    /// The last calendar month.
    Month,
    #[default]
    All,
}

impl DateWindow {
    pub fn lower_bound(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            DateWindow::Today => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc()),
            DateWindow::Week => now.checked_sub_signed(Duration::days(7)),
            DateWindow::Month => now.checked_sub_months(Months::new(1)),
            DateWindow::All => None,
        }
    }
}

impl FromStr for DateWindow {
    type Err = ModelError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_keyword(
            raw,
            "date window",
            &[
                ("today", DateWindow::Today),
                ("week", DateWindow::Week),
                ("month", DateWindow::Month),
                ("all", DateWindow::All),
            ],
        )
    }
}

/// Conjunction of every history predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HistoryFilter {
    pub tab: StatusTab,
    pub score_band: ScoreBand,
    /// Case-insensitive substring matched against file name or hash.
    pub search: Option<String>,
    pub since: DateWindow,
}

impl HistoryFilter {
    pub fn with_tab(mut self, tab: StatusTab) -> Self {
        self.tab = tab;
        self
    }

    pub fn with_score_band(mut self, band: ScoreBand) -> Self {
        self.score_band = band;
        self
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        self.search = (!term.trim().is_empty()).then_some(term);
        self
    }

    pub fn with_since(mut self, window: DateWindow) -> Self {
        self.since = window;
        self
    }

    pub fn matches(&self, entry: &HistoryEntry, now: DateTime<Utc>) -> bool {
        if !self.tab.matches(entry) || !self.score_band.matches(entry) {
            return false;
        }

        if let Some(term) = self.search.as_deref() {
            let needle = term.to_lowercase();
            let in_name = entry.file_name.to_lowercase().contains(&needle);
            let in_hash = entry
                .sha256
                .as_deref()
                .is_some_and(|hash| hash.to_lowercase().contains(&needle));
            if !in_name && !in_hash {
                return false;
            }
        }

        match self.since.lower_bound(now) {
            Some(bound) => entry.timestamp >= bound,
            None => true,
        }
    }
}

/// Counts per history tab.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryStats {
    pub total: usize,
    pub clean: usize,
    pub suspicious: usize,
    pub malicious: usize,
    pub failed: usize,
}

impl HistoryStats {
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a HistoryEntry>) -> Self {
        let mut stats = Self::default();
        for entry in entries {
            stats.total += 1;
            match entry.band() {
                Some(RiskLabel::Clean) => stats.clean += 1,
                Some(RiskLabel::Suspicious) => stats.suspicious += 1,
                Some(RiskLabel::Malicious) => stats.malicious += 1,
                None => {}
            }
            if entry.is_error() {
                stats.failed += 1;
            }
        }
        stats
    }
}

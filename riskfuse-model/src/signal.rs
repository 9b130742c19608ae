//! Structured outputs of the remote detection engines.
//!
//! Reports are produced by the signal client, never mutated afterwards, and
//! simply absent when the corresponding call failed or was skipped.

use std::fmt;

/// Step of the per-file pipeline that talks to a remote service (or reads
/// the local file). Used to tag transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SignalStage {
    Read,
    Upload,
    Reputation,
    Classify,
    Combined,
}

impl SignalStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStage::Read => "read",
            SignalStage::Upload => "upload",
            SignalStage::Reputation => "reputation",
            SignalStage::Classify => "classify",
            SignalStage::Combined => "combined",
        }
    }
}

impl fmt::Display for SignalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque token returned by the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-verdict engine counts from a hash reputation lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisStats {
    pub harmless: u32,
    pub undetected: u32,
    pub malicious: u32,
    pub suspicious: u32,
}

impl AnalysisStats {
    pub fn total(&self) -> u32 {
        self.harmless
            .saturating_add(self.undetected)
            .saturating_add(self.malicious)
            .saturating_add(self.suspicious)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
}

/// Secondary reputation source keyed on known-malware sample feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MalwareReputation {
    pub detected: bool,
    #[cfg_attr(feature = "serde", serde(default))]
    pub threat_level: Option<ThreatLevel>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub threat_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReputationReport {
    pub sha256: Option<String>,
    pub stats: AnalysisStats,
    pub threat_name: Option<String>,
    pub type_description: Option<String>,
    pub malware: Option<MalwareReputation>,
}

/// Classifier scores arrive either as JSON numbers or as numeric strings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MlScore {
    Number(f64),
    Text(String),
}

impl MlScore {
    /// Numeric value if the score is present and finite.
    pub fn value(&self) -> Option<f64> {
        let value = match self {
            MlScore::Number(value) => *value,
            MlScore::Text(raw) => raw.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for MlScore {
    fn from(value: f64) -> Self {
        MlScore::Number(value)
    }
}

impl From<&str> for MlScore {
    fn from(value: &str) -> Self {
        MlScore::Text(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MlReport {
    pub label: String,
    pub score: MlScore,
    pub family: Option<String>,
}

/// Categorical verdict of the generic classifier. Unrecognised labels are kept
/// verbatim so they survive a round trip through history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "String", into = "String"))]
pub enum CombinedLabel {
    Benign,
    Suspicious,
    Malicious,
    Unknown,
    Other(String),
}

impl CombinedLabel {
    pub fn as_str(&self) -> &str {
        match self {
            CombinedLabel::Benign => "benign",
            CombinedLabel::Suspicious => "suspicious",
            CombinedLabel::Malicious => "malicious",
            CombinedLabel::Unknown => "unknown",
            CombinedLabel::Other(raw) => raw,
        }
    }
}

impl From<String> for CombinedLabel {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "benign" => CombinedLabel::Benign,
            "suspicious" => CombinedLabel::Suspicious,
            "malicious" => CombinedLabel::Malicious,
            "unknown" => CombinedLabel::Unknown,
            _ => CombinedLabel::Other(raw),
        }
    }
}

impl From<&str> for CombinedLabel {
    fn from(raw: &str) -> Self {
        CombinedLabel::from(raw.to_string())
    }
}

impl From<CombinedLabel> for String {
    fn from(label: CombinedLabel) -> Self {
        match label {
            CombinedLabel::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombinedReport {
    pub label: CombinedLabel,
    pub file_type: Option<String>,
    pub classifier: Option<String>,
}

/// The reports collected for one file, at most one per engine.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SignalSet {
    pub reputation: Option<ReputationReport>,
    pub ml: Option<MlReport>,
    pub combined: Option<CombinedReport>,
}

impl SignalSet {
    pub fn new(
        reputation: Option<ReputationReport>,
        ml: Option<MlReport>,
        combined: Option<CombinedReport>,
    ) -> Self {
        Self {
            reputation,
            ml,
            combined,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reputation.is_none() && self.ml.is_none() && self.combined.is_none()
    }

    pub fn len(&self) -> usize {
        usize::from(self.reputation.is_some())
            + usize::from(self.ml.is_some())
            + usize::from(self.combined.is_some())
    }

    /// Hash reported by the reputation service, if any.
    pub fn sha256(&self) -> Option<&str> {
        self.reputation
            .as_ref()
            .and_then(|report| report.sha256.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_total_sums_every_bucket() {
        let stats = AnalysisStats {
            harmless: 50,
            undetected: 30,
            malicious: 15,
            suspicious: 5,
        };
        assert_eq!(stats.total(), 100);
        assert_eq!(AnalysisStats::default().total(), 0);
    }

    #[test]
    fn ml_score_accepts_numbers_and_numeric_strings() {
        assert_eq!(MlScore::from(0.25).value(), Some(0.25));
        assert_eq!(MlScore::from(" 0.9 ").value(), Some(0.9));
        assert_eq!(MlScore::from("n/a").value(), None);
        assert_eq!(MlScore::Number(f64::NAN).value(), None);
    }

    #[test]
    fn combined_label_parsing_is_case_insensitive_and_lossless() {
        assert_eq!(CombinedLabel::from("Malicious"), CombinedLabel::Malicious);
        assert_eq!(CombinedLabel::from("benign"), CombinedLabel::Benign);
        let other = CombinedLabel::from("malware");
        assert_eq!(other, CombinedLabel::Other("malware".into()));
        assert_eq!(String::from(other), "malware");
    }

    #[test]
    fn signal_set_counts_present_reports_and_exposes_remote_hash() {
        assert!(SignalSet::default().is_empty());

        let set = SignalSet::new(
            Some(ReputationReport {
                sha256: Some("abc123".into()),
                ..ReputationReport::default()
            }),
            None,
            Some(CombinedReport {
                label: CombinedLabel::Suspicious,
                file_type: None,
                classifier: None,
            }),
        );
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        assert_eq!(set.sha256(), Some("abc123"));
    }
}

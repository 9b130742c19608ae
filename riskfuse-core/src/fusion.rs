//! Score fusion: collapse one file's signal reports into a single 0-100 risk
//! score.
//!
//! Every signal is normalised to a sub-score in `[0, 100]` first. The default
//! four-signal policy then applies a tiered rule set where the first matching
//! tier wins; the legacy two-signal policy is a plain weighted sum over the
//! reputation ratio and the ML score.

use riskfuse_model::{
    CombinedLabel, CombinedReport, MlReport, ReputationReport, RiskLabel, RiskScore,
    SignalSet, ThreatLevel,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::FusionInputError;

/// Scaling applied to the malicious-engine ratio before it enters fusion.
pub const REPUTATION_WEIGHT: f64 = 0.6;

/// Weights for the legacy reputation + ML policy.
pub const DEFAULT_TWO_SIGNAL_REPUTATION_WEIGHT: f64 = 0.6;
pub const DEFAULT_TWO_SIGNAL_ML_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FusionPolicy {
    #[default]
    FourSignal,
    TwoSignal {
        reputation_weight: f64,
        ml_weight: f64,
    },
}

impl FusionPolicy {
    pub fn two_signal() -> Self {
        FusionPolicy::TwoSignal {
            reputation_weight: DEFAULT_TWO_SIGNAL_REPUTATION_WEIGHT,
            ml_weight: DEFAULT_TWO_SIGNAL_ML_WEIGHT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FusionPolicy::FourSignal => "four_signal",
            FusionPolicy::TwoSignal { .. } => "two_signal",
        }
    }
}

/// Normalised per-signal contributions, each in `[0, 100]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub reputation: f64,
    pub ml: f64,
    pub combined: f64,
    pub malware: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionOutcome {
    pub score: RiskScore,
    pub label: RiskLabel,
    pub sub_scores: SubScores,
}

/// Fraction of engines that flagged the file as malicious, in `[0, 1]`.
pub fn malicious_ratio(report: &ReputationReport) -> f64 {
    let total = report.stats.total();
    if total == 0 {
        return 0.0;
    }
    f64::from(report.stats.malicious) / f64::from(total)
}

pub fn reputation_sub_score(report: Option<&ReputationReport>) -> f64 {
    report
        .map(|report| malicious_ratio(report) * 100.0 * REPUTATION_WEIGHT)
        .unwrap_or(0.0)
}

/// Classifier probability in `[0, 1]`.
pub fn ml_probability(report: &MlReport) -> Result<f64, FusionInputError> {
    let value = report.score.value().ok_or_else(|| {
        FusionInputError::UnparseableMlScore(format!("{:?}", report.score))
    })?;
    if !(0.0..=1.0).contains(&value) {
        return Err(FusionInputError::MlScoreOutOfRange(value));
    }
    Ok(value)
}

pub fn ml_sub_score(report: Option<&MlReport>) -> f64 {
    let Some(report) = report else {
        return 0.0;
    };
    match ml_probability(report) {
        Ok(probability) => probability * 100.0,
        Err(err) => {
            debug!(error = %err, "ignoring ml signal");
            0.0
        }
    }
}

pub fn combined_sub_score(report: Option<&CombinedReport>) -> f64 {
    match report.map(|report| &report.label) {
        None => 0.0,
        Some(CombinedLabel::Malicious) => 80.0,
        Some(CombinedLabel::Suspicious) => 50.0,
        Some(CombinedLabel::Benign) => 0.0,
        Some(CombinedLabel::Unknown | CombinedLabel::Other(_)) => 20.0,
    }
}

pub fn malware_sub_score(report: Option<&ReputationReport>) -> f64 {
    let Some(malware) = report.and_then(|report| report.malware.as_ref()) else {
        return 0.0;
    };
    if !malware.detected {
        return 0.0;
    }
    match malware.threat_level {
        Some(ThreatLevel::High) => 90.0,
        Some(ThreatLevel::Medium) => 70.0,
        Some(ThreatLevel::Low) => 40.0,
        None => 60.0,
    }
}

impl SubScores {
    pub fn from_signals(signals: &SignalSet) -> Self {
        let reputation = signals.reputation.as_ref();
        Self {
            reputation: reputation_sub_score(reputation),
            ml: ml_sub_score(signals.ml.as_ref()),
            combined: combined_sub_score(signals.combined.as_ref()),
            malware: malware_sub_score(reputation),
        }
    }
}

fn tiered(sub: &SubScores) -> f64 {
    let SubScores {
        reputation,
        ml,
        combined,
        malware,
    } = *sub;

    if reputation == 0.0 && malware == 0.0 && combined == 0.0 {
        ml
    } else if reputation > 30.0 && (malware > 50.0 || combined > 50.0) {
        reputation.max(malware).max(combined) + 0.2 * ml
    } else if combined > 70.0 {
        0.2 * reputation + 0.2 * ml + 0.2 * malware + 0.4 * combined
    } else if malware > 60.0 {
        0.2 * reputation + 0.2 * ml + 0.2 * combined + 0.4 * malware
    } else if reputation > 40.0 {
        0.4 * reputation + 0.2 * ml + 0.2 * combined + 0.2 * malware
    } else {
        0.3 * reputation + 0.2 * ml + 0.3 * combined + 0.2 * malware
    }
}

/// Pure, deterministic fusion under a fixed policy.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FusionEngine {
    policy: FusionPolicy,
}

impl FusionEngine {
    pub fn new(policy: FusionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FusionPolicy {
        self.policy
    }

    pub fn fuse(&self, signals: &SignalSet) -> FusionOutcome {
        let sub_scores = SubScores::from_signals(signals);
        let raw = match self.policy {
            FusionPolicy::FourSignal => tiered(&sub_scores),
            FusionPolicy::TwoSignal {
                reputation_weight,
                ml_weight,
            } => {
                let ratio = signals.reputation.as_ref().map(malicious_ratio).unwrap_or(0.0);
                reputation_weight * ratio * 100.0 + ml_weight * sub_scores.ml
            }
        };
        let score = RiskScore::from_f64(raw);
        FusionOutcome {
            score,
            label: score.label(),
            sub_scores,
        }
    }
}

/// Four-signal fusion over individually supplied reports.
pub fn fuse(
    reputation: Option<&ReputationReport>,
    ml: Option<&MlReport>,
    combined: Option<&CombinedReport>,
) -> FusionOutcome {
    let signals = SignalSet::new(reputation.cloned(), ml.cloned(), combined.cloned());
    FusionEngine::default().fuse(&signals)
}

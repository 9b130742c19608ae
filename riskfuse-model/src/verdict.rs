use std::fmt;

/// Qualitative reading of a fused risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum RiskLabel {
    Clean,
    Suspicious,
    Malicious,
}

impl RiskLabel {
    /// Upper bound (inclusive) of the clean band.
    pub const CLEAN_MAX: u8 = 30;
    /// Upper bound (inclusive) of the suspicious band.
    pub const SUSPICIOUS_MAX: u8 = 70;

    pub fn for_score(score: RiskScore) -> Self {
        match score.value() {
            s if s <= Self::CLEAN_MAX => RiskLabel::Clean,
            s if s <= Self::SUSPICIOUS_MAX => RiskLabel::Suspicious,
            _ => RiskLabel::Malicious,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Clean => "clean",
            RiskLabel::Suspicious => "suspicious",
            RiskLabel::Malicious => "malicious",
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Integer risk score, always within `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "u8", into = "u8"))]
pub struct RiskScore(u8);

impl RiskScore {
    pub const MIN: RiskScore = RiskScore(0);
    pub const MAX: RiskScore = RiskScore(100);

    /// Clamp an arbitrary integer into the score range.
    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(0, 100) as u8)
    }

    /// Round half away from zero, then clamp. NaN maps to zero.
    pub fn from_f64(raw: f64) -> Self {
        if raw.is_nan() {
            return Self::MIN;
        }
        Self::clamped(raw.round() as i64)
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn label(&self) -> RiskLabel {
        RiskLabel::for_score(*self)
    }
}

impl From<u8> for RiskScore {
    fn from(raw: u8) -> Self {
        Self::clamped(i64::from(raw))
    }
}

impl From<RiskScore> for u8 {
    fn from(score: RiskScore) -> Self {
        score.0
    }
}

impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_edges() {
        assert_eq!(RiskScore::clamped(0).label(), RiskLabel::Clean);
        assert_eq!(RiskScore::clamped(30).label(), RiskLabel::Clean);
        assert_eq!(RiskScore::clamped(31).label(), RiskLabel::Suspicious);
        assert_eq!(RiskScore::clamped(70).label(), RiskLabel::Suspicious);
        assert_eq!(RiskScore::clamped(71).label(), RiskLabel::Malicious);
    }

    #[test]
    fn clamping_and_rounding() {
        assert_eq!(RiskScore::clamped(-4).value(), 0);
        assert_eq!(RiskScore::clamped(250).value(), 100);
        assert_eq!(RiskScore::from_f64(51.2).value(), 51);
        assert_eq!(RiskScore::from_f64(50.5).value(), 51);
        assert_eq!(RiskScore::from_f64(f64::NAN).value(), 0);
        assert_eq!(RiskScore::from(180u8).value(), 100);
    }
}

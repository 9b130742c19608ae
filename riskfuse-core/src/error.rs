use riskfuse_model::SignalStage;
use thiserror::Error;

/// Why a remote (or local read) call failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportErrorKind {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Failure of one signal-client operation, tagged with the failing stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage}: {kind}")]
pub struct TransportError {
    pub stage: SignalStage,
    pub kind: TransportErrorKind,
}

impl TransportError {
    pub fn new(stage: SignalStage, kind: TransportErrorKind) -> Self {
        Self { stage, kind }
    }

    pub fn status(stage: SignalStage, status: u16, body: impl Into<String>) -> Self {
        Self::new(
            stage,
            TransportErrorKind::Status {
                status,
                body: body.into(),
            },
        )
    }

    pub fn network(stage: SignalStage, message: impl Into<String>) -> Self {
        Self::new(stage, TransportErrorKind::Network(message.into()))
    }

    pub fn decode(stage: SignalStage, message: impl Into<String>) -> Self {
        Self::new(stage, TransportErrorKind::Decode(message.into()))
    }

    pub fn io(stage: SignalStage, err: &std::io::Error) -> Self {
        Self::new(stage, TransportErrorKind::Io(err.to_string()))
    }

    pub fn from_reqwest(stage: SignalStage, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_decode() {
            TransportErrorKind::Decode(err.to_string())
        } else {
            TransportErrorKind::Network(err.to_string())
        };
        Self::new(stage, kind)
    }
}

/// A signal payload that cannot contribute to fusion. Never fatal: the
/// affected sub-score is treated as zero.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionInputError {
    #[error("ml score {0:?} is not a finite number")]
    UnparseableMlScore(String),

    #[error("ml score {0} outside of [0, 1]")]
    MlScoreOutOfRange(f64),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("history backend I/O error: {0}")]
    Backend(String),

    #[error("history entry failed integrity check: {0}")]
    Integrity(String),

    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

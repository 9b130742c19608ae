use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    ConcurrencyOutOfRange(usize),
    InvalidFilter(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::ConcurrencyOutOfRange(value) => write!(
                f,
                "concurrency limit {value} outside of [{}, {}]",
                crate::job::ConcurrencyLimit::MIN,
                crate::job::ConcurrencyLimit::MAX
            ),
            ModelError::InvalidFilter(msg) => {
                write!(f, "invalid history filter: {msg}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;

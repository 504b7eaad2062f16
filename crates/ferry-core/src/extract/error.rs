//! Error types that cross the extraction boundary.

use std::time::Duration;

use thiserror::Error;

/// Why a candidate artifact was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("artifact output is empty")]
    EmptyOutput,
    #[error("artifact file path is empty")]
    MissingPath,
    #[error("duration {actual:?} does not exceed minimum {min:?}")]
    TooShort { actual: Duration, min: Duration },
    #[error("sample rate must be positive")]
    ZeroSampleRate,
    #[error("unsupported channel count {0} (expected 1 or 2)")]
    UnsupportedChannels(u16),
    #[error("artifact has no method tag")]
    MissingMethod,
}

/// A race that produced no acceptable artifact. The caller falls back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceFailure {
    #[error("race deadline of {deadline:?} elapsed with no accepted result")]
    Timeout {
        deadline: Duration,
        attempted: Vec<String>,
        cancelled: Vec<String>,
    },
    #[error("all {} strategies failed", .attempted.len())]
    AllFailed { attempted: Vec<String> },
}

impl RaceFailure {
    pub fn attempted(&self) -> &[String] {
        match self {
            RaceFailure::Timeout { attempted, .. } | RaceFailure::AllFailed { attempted } => {
                attempted
            }
        }
    }

    pub fn cancelled(&self) -> &[String] {
        match self {
            RaceFailure::Timeout { cancelled, .. } => cancelled,
            RaceFailure::AllFailed { .. } => &[],
        }
    }
}

/// The only error an extraction caller ever sees.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    /// The fallback itself failed validation: there is no usable output at all.
    #[error("fallback output rejected: {0}")]
    FallbackExhausted(#[source] ValidationError),
}

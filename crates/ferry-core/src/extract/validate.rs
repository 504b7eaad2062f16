//! Acceptance check applied to every candidate artifact, including the fallback.

use std::time::Duration;

use super::artifact::{Artifact, ArtifactOutput};
use super::error::ValidationError;
use crate::config::ValidationConfig;

/// Pure predicate over artifacts. Cheap to copy.
#[derive(Debug, Clone, Copy)]
pub struct ResultValidator {
    min_duration: Duration,
}

impl Default for ResultValidator {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl ResultValidator {
    pub fn new(min_duration: Duration) -> Self {
        Self { min_duration }
    }

    pub fn from_config(cfg: &ValidationConfig) -> Self {
        Self::new(Duration::try_from_secs_f64(cfg.min_duration_secs).unwrap_or(Duration::ZERO))
    }

    pub fn min_duration(&self) -> Duration {
        self.min_duration
    }

    /// Returns the first failed check, if any.
    pub fn validate(&self, artifact: &Artifact) -> Result<(), ValidationError> {
        if let ArtifactOutput::File { path, .. } = &artifact.output {
            if path.as_os_str().is_empty() {
                return Err(ValidationError::MissingPath);
            }
        }
        if artifact.output.is_empty() {
            return Err(ValidationError::EmptyOutput);
        }
        if artifact.duration <= self.min_duration {
            return Err(ValidationError::TooShort {
                actual: artifact.duration,
                min: self.min_duration,
            });
        }
        if artifact.sample_rate == 0 {
            return Err(ValidationError::ZeroSampleRate);
        }
        if !matches!(artifact.channels, 1 | 2) {
            return Err(ValidationError::UnsupportedChannels(artifact.channels));
        }
        if artifact.method.trim().is_empty() {
            return Err(ValidationError::MissingMethod);
        }
        Ok(())
    }

    pub fn accepts(&self, artifact: &Artifact) -> bool {
        self.validate(artifact).is_ok()
    }
}

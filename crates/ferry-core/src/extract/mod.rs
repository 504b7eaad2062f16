//! Racing extraction: run candidate strategies concurrently, keep the first
//! validated artifact, and fall back to a synthetic placeholder otherwise.

mod artifact;
mod command;
mod error;
mod fallback;
mod gauge;
mod racer;
mod request;
mod strategy;
mod validate;

pub use artifact::{
    Artifact, ArtifactOutput, FailureKind, RaceResult, StrategyOutcome, FALLBACK_METHOD,
};
pub use crate::control::CancelToken;
pub use command::CommandStrategy;
pub use error::{ExtractError, RaceFailure, ValidationError};
pub use fallback::FallbackSynthesizer;
pub use gauge::{ResourceGauge, ResourceGuard};
pub use racer::StrategyRacer;
pub use request::{Constraints, ExtractionRequest, SinkDescriptor, SourceRef};
pub use strategy::{SharedStrategy, Strategy};
pub use validate::ResultValidator;

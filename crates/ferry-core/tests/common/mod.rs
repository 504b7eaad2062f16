//! Shared helpers for integration tests: scripted strategies and a tiny
//! deterministic PRNG for varied timings.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ferry_core::extract::{
    Artifact, ArtifactOutput, CancelToken, Constraints, ExtractionRequest, FailureKind,
    ResourceGauge, SharedStrategy, SinkDescriptor, SourceRef, Strategy, StrategyOutcome,
};

/// How a staged strategy ends once its stages have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Succeed,
    Fail(FailureKind),
    /// Success the validator rejects (too short).
    Truncated,
}

/// Strategy that acquires one resource per stage and sleeps between them,
/// so cancellation can land in the middle of "work".
pub struct Staged {
    pub name: String,
    pub stages: Vec<Duration>,
    pub finish: Finish,
    pub gauge: ResourceGauge,
    /// Keep sleeping after cancellation; only an abort stops it.
    pub stubborn: bool,
}

impl Staged {
    pub fn total(&self) -> Duration {
        self.stages.iter().sum()
    }
}

#[async_trait]
impl Strategy for Staged {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _request: &ExtractionRequest, cancel: CancelToken) -> StrategyOutcome {
        let mut held = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            held.push(self.gauge.acquire("stage"));
            if self.stubborn {
                tokio::time::sleep(*stage).await;
                continue;
            }
            tokio::select! {
                _ = tokio::time::sleep(*stage) => {}
                _ = cancel.cancelled() => return StrategyOutcome::transient("cancelled"),
            }
        }
        match self.finish {
            Finish::Succeed => StrategyOutcome::Success(artifact(&self.name, 2.0)),
            Finish::Truncated => StrategyOutcome::Success(artifact(&self.name, 0.1)),
            Finish::Fail(kind) => StrategyOutcome::Failure {
                reason: format!("{} gave up", self.name),
                kind,
            },
        }
    }
}

pub fn artifact(method: &str, secs: f64) -> Artifact {
    Artifact {
        output: ArtifactOutput::Inline(vec![0; 128]),
        duration: Duration::from_secs_f64(secs),
        sample_rate: 16_000,
        channels: 1,
        method: method.to_string(),
    }
}

pub fn staged(
    gauge: &ResourceGauge,
    name: &str,
    stages_ms: &[u64],
    finish: Finish,
) -> Arc<Staged> {
    Arc::new(Staged {
        name: name.to_string(),
        stages: stages_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        finish,
        gauge: gauge.clone(),
        stubborn: false,
    })
}

pub fn shared(strategies: &[Arc<Staged>]) -> Vec<SharedStrategy> {
    strategies
        .iter()
        .map(|s| Arc::clone(s) as SharedStrategy)
        .collect()
}

pub fn request() -> ExtractionRequest {
    ExtractionRequest::new(
        SourceRef::Path("lecture.mkv".into()),
        SinkDescriptor::Memory,
        Constraints::default(),
    )
}

/// xorshift64*; deterministic per seed.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }

    pub fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.0 = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform-ish in `0..n`.
    pub fn below(&mut self, n: u64) -> u64 {
        self.next() % n.max(1)
    }
}

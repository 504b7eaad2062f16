//! The strategy interface raced by [`StrategyRacer`](super::StrategyRacer).

use std::sync::Arc;

use async_trait::async_trait;

use super::artifact::StrategyOutcome;
use super::request::ExtractionRequest;
use crate::control::CancelToken;

/// One pathway for producing an artifact from a request.
///
/// Implementations must watch `cancel` at safe points and release everything
/// they hold (child processes, temp files, buffers) before returning. The racer
/// may also drop the future outright after its grace period, so resources should
/// be owned by drop guards rather than released by hand at the end of `run`.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Stable name, used as the artifact method tag and in telemetry.
    fn name(&self) -> &str;

    /// Attempt the extraction. Failures are reported, never panicked.
    async fn run(&self, request: &ExtractionRequest, cancel: CancelToken) -> StrategyOutcome;
}

/// Strategies are shared with spawned race tasks.
pub type SharedStrategy = Arc<dyn Strategy>;

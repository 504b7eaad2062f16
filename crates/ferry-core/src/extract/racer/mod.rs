//! First-validated-success race over a list of strategies.
//!
//! Every strategy runs on its own tokio task against the same request and one
//! shared deadline. The first success that passes the validator wins; a short
//! tie window lets an earlier-registered strategy that finished at effectively
//! the same instant take precedence. Losers are cancelled through a shared
//! [`CancelToken`] and awaited (then aborted if they overstay the grace period)
//! before the race returns, so no strategy work outlives the call.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::artifact::{Artifact, FailureKind, RaceResult, StrategyOutcome};
use super::error::{ExtractError, RaceFailure};
use super::fallback::FallbackSynthesizer;
use super::request::ExtractionRequest;
use super::strategy::SharedStrategy;
use super::validate::ResultValidator;
use crate::control::CancelToken;
use crate::config::FerryConfig;
use crate::telemetry::{RaceRecord, TelemetryRecorder};

/// Runs strategies concurrently and returns the single accepted artifact.
#[derive(Debug, Clone)]
pub struct StrategyRacer {
    validator: ResultValidator,
    fallback: FallbackSynthesizer,
    deadline: Duration,
    tie_window: Duration,
    cancel_grace: Duration,
    telemetry: Option<TelemetryRecorder>,
}

/// Bookkeeping for one launched strategy.
struct Entrant {
    name: String,
    handle: Option<JoinHandle<()>>,
}

/// Live state of one race.
///
/// Dropping it cancels the token, aborts any task still held and discards
/// unclaimed successes, so an abandoned `race` future leaves nothing running.
struct Field {
    token: CancelToken,
    entrants: Vec<Entrant>,
    rx: mpsc::UnboundedReceiver<(usize, StrategyOutcome)>,
}

impl Drop for Field {
    fn drop(&mut self) {
        self.token.cancel();
        for entrant in &mut self.entrants {
            if let Some(handle) = entrant.handle.take() {
                handle.abort();
            }
        }
        self.rx.close();
        while let Ok((_, outcome)) = self.rx.try_recv() {
            if let StrategyOutcome::Success(artifact) = outcome {
                artifact.discard();
            }
        }
    }
}

/// What the collection loop decided, before cleanup.
enum Verdict {
    Winner {
        index: usize,
        artifact: Artifact,
        decided_at: Instant,
    },
    TimedOut,
    AllFailed,
}

impl StrategyRacer {
    pub fn from_config(cfg: &FerryConfig) -> Self {
        let validator = ResultValidator::from_config(&cfg.validation);
        Self {
            fallback: FallbackSynthesizer::new(cfg.fallback.clone(), validator.min_duration()),
            validator,
            deadline: cfg.race.deadline(),
            tie_window: cfg.race.tie_window(),
            cancel_grace: cfg.race.cancel_grace(),
            telemetry: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_tie_window(mut self, tie_window: Duration) -> Self {
        self.tie_window = tie_window;
        self
    }

    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryRecorder) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn validator(&self) -> &ResultValidator {
        &self.validator
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Race `strategies` (in priority order) for `request`.
    ///
    /// Individual strategy failures are absorbed; only the aggregate outcome is
    /// returned. On `Err` the caller is expected to fall back.
    pub async fn race(
        &self,
        request: &ExtractionRequest,
        strategies: &[SharedStrategy],
    ) -> Result<RaceResult, RaceFailure> {
        let started = Instant::now();
        let deadline_at = started + self.deadline;
        let attempted: Vec<String> = strategies.iter().map(|s| s.name().to_string()).collect();

        tracing::debug!(
            category = request.category(),
            strategies = ?attempted,
            deadline_ms = self.deadline.as_millis() as u64,
            "race start"
        );

        if strategies.is_empty() {
            self.record(request, None, Duration::ZERO, &attempted, Vec::new());
            return Err(RaceFailure::AllFailed { attempted });
        }

        let shared_request = Arc::new(request.clone());
        let (tx, rx) = mpsc::unbounded_channel::<(usize, StrategyOutcome)>();
        let mut field = Field {
            token: CancelToken::new(),
            entrants: Vec::with_capacity(strategies.len()),
            rx,
        };
        for (index, strategy) in strategies.iter().enumerate() {
            let strategy = Arc::clone(strategy);
            let request = Arc::clone(&shared_request);
            let token = field.token.clone();
            let tx = tx.clone();
            let handle = tokio::spawn(async move {
                let outcome = strategy.run(&request, token).await;
                // Receiver gone: the race was abandoned and nobody will claim this.
                if let Err(mpsc::error::SendError((_, StrategyOutcome::Success(artifact)))) =
                    tx.send((index, outcome))
                {
                    artifact.discard();
                }
            });
            field.entrants.push(Entrant {
                name: attempted[index].clone(),
                handle: Some(handle),
            });
        }
        drop(tx);

        let mut pending: BTreeSet<usize> = (0..field.entrants.len()).collect();
        let mut fatal: Vec<String> = Vec::new();
        let mut best: Option<(usize, Artifact)> = None;
        let mut first_accept: Option<Instant> = None;

        let verdict = loop {
            let wait_until = match first_accept {
                Some(at) => (at + self.tie_window).min(deadline_at),
                None => deadline_at,
            };
            let received = tokio::time::timeout_at(wait_until, field.rx.recv()).await;
            match received {
                Ok(Some((index, outcome))) => {
                    pending.remove(&index);
                    let name = &field.entrants[index].name;
                    match outcome {
                        StrategyOutcome::Success(artifact) => {
                            match self.validator.validate(&artifact) {
                                Ok(()) => {
                                    tracing::debug!(strategy = %name, "strategy produced accepted artifact");
                                    first_accept.get_or_insert_with(Instant::now);
                                    if best.as_ref().map_or(true, |(i, _)| index < *i) {
                                        if let Some((_, displaced)) = best.replace((index, artifact)) {
                                            displaced.discard();
                                        }
                                    } else {
                                        artifact.discard();
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!(strategy = %name, error = %e, "strategy output rejected");
                                    artifact.discard();
                                }
                            }
                        }
                        StrategyOutcome::Failure { reason, kind } => {
                            tracing::debug!(strategy = %name, ?kind, %reason, "strategy failed");
                            if kind == FailureKind::Fatal {
                                fatal.push(name.clone());
                            }
                        }
                    }
                }
                // Every task has finished; panicked ones never reported.
                Ok(None) => pending.clear(),
                Err(_) => {}
            }

            let now = Instant::now();
            let decided = match &best {
                // No earlier-registered strategy is still running, so nothing can outrank it.
                Some((index, _)) => {
                    pending.iter().all(|p| p > index)
                        || first_accept.is_some_and(|at| now >= at + self.tie_window)
                        || now >= deadline_at
                }
                None => false,
            };
            if decided {
                if let Some((index, artifact)) = best.take() {
                    break Verdict::Winner {
                        index,
                        artifact,
                        decided_at: first_accept.unwrap_or(now),
                    };
                }
            }
            if pending.is_empty() {
                break Verdict::AllFailed;
            }
            if best.is_none() && now >= deadline_at {
                break Verdict::TimedOut;
            }
        };

        // Anything not yet finished at decision time is a loser we are cancelling.
        let cancelled: Vec<String> = field
            .entrants
            .iter()
            .enumerate()
            .filter(|(i, e)| {
                pending.contains(i) && e.handle.as_ref().is_some_and(|h| !h.is_finished())
            })
            .map(|(_, e)| e.name.clone())
            .collect();
        field.token.cancel();
        self.reap(&mut field.entrants).await;
        // Successes that arrived after the decision are discarded here.
        drop(field);

        match verdict {
            Verdict::Winner {
                index,
                artifact,
                decided_at,
            } => {
                let elapsed = decided_at.duration_since(started);
                tracing::info!(
                    category = request.category(),
                    method = %artifact.method,
                    winner_index = index,
                    elapsed_ms = elapsed.as_millis() as u64,
                    cancelled = ?cancelled,
                    "race won"
                );
                self.record(request, Some(artifact.method.clone()), elapsed, &attempted, fatal);
                Ok(RaceResult {
                    artifact,
                    elapsed,
                    attempted,
                    cancelled,
                })
            }
            Verdict::TimedOut => {
                tracing::warn!(
                    category = request.category(),
                    deadline_ms = self.deadline.as_millis() as u64,
                    cancelled = ?cancelled,
                    "race deadline elapsed"
                );
                self.record(request, None, started.elapsed(), &attempted, fatal);
                Err(RaceFailure::Timeout {
                    deadline: self.deadline,
                    attempted,
                    cancelled,
                })
            }
            Verdict::AllFailed => {
                tracing::warn!(category = request.category(), "all strategies failed");
                self.record(request, None, started.elapsed(), &attempted, fatal);
                Err(RaceFailure::AllFailed { attempted })
            }
        }
    }

    /// Race, and synthesize the placeholder artifact if no strategy wins.
    ///
    /// The only error is [`ExtractError::FallbackExhausted`], which means there is
    /// no usable output at all.
    pub async fn race_or_fallback(
        &self,
        request: &ExtractionRequest,
        strategies: &[SharedStrategy],
    ) -> Result<RaceResult, ExtractError> {
        let started = Instant::now();
        let failure = match self.race(request, strategies).await {
            Ok(result) => return Ok(result),
            Err(failure) => failure,
        };
        tracing::warn!(category = request.category(), reason = %failure, "using fallback artifact");
        let artifact = self.fallback.synthesize(request);
        if let Err(e) = self.validator.validate(&artifact) {
            tracing::error!(error = %e, "fallback artifact failed validation");
            return Err(ExtractError::FallbackExhausted(e));
        }
        Ok(RaceResult {
            artifact,
            elapsed: started.elapsed(),
            attempted: failure.attempted().to_vec(),
            cancelled: failure.cancelled().to_vec(),
        })
    }

    /// Wait for every task to wind down after cancellation; abort stragglers.
    async fn reap(&self, entrants: &mut [Entrant]) {
        let grace_at = Instant::now() + self.cancel_grace;
        for entrant in entrants.iter_mut() {
            let Some(mut handle) = entrant.handle.take() else {
                continue;
            };
            match tokio::time::timeout_at(grace_at, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => {
                    tracing::warn!(strategy = %entrant.name, "strategy panicked");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    tracing::warn!(strategy = %entrant.name, "strategy ignored cancellation; aborting");
                    handle.abort();
                    // Aborted tasks drop their future (and its guards) at the next await point.
                    if tokio::time::timeout(self.cancel_grace, handle).await.is_err() {
                        tracing::error!(strategy = %entrant.name, "strategy still blocked after abort");
                    }
                }
            }
        }
    }

    fn record(
        &self,
        request: &ExtractionRequest,
        chosen: Option<String>,
        elapsed: Duration,
        attempted: &[String],
        fatal: Vec<String>,
    ) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let recorded_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        telemetry.record(RaceRecord {
            category: request.category().to_string(),
            chosen,
            elapsed_ms: elapsed.as_millis() as u64,
            attempted: attempted.to_vec(),
            fatal,
            recorded_at,
        });
    }
}

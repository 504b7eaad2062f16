//! Registry of transfer records: state transitions, progress, stalls and retention.
//!
//! The manager is a cheap `Clone` around a shared map. Locks are never held
//! across an await; pollers take a fresh snapshot each tick.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::feed::ProgressFeed;
use super::monitor::{
    Eta, IngestError, IngestOutcome, MonitorSnapshot, SpeedEstimate, TransferMonitor,
};
use super::state::{FailureReason, TransferState, TransitionError};
use crate::config::{FerryConfig, LifecycleConfig, MonitorConfig};
use crate::control::CancelToken;

/// `tokio::time::interval` rejects a zero period.
const MIN_TICK: Duration = Duration::from_millis(1);

/// Transfer identifier, chosen by the caller.
pub type TransferId = u64;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("unknown transfer {0}")]
    NotFound(TransferId),
    #[error("transfer {0} already exists")]
    AlreadyExists(TransferId),
    #[error("transfer {id} is already {state}")]
    Finished { id: TransferId, state: &'static str },
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// Pollable view of one transfer.
#[derive(Debug, Clone)]
pub struct TransferSnapshot {
    pub id: TransferId,
    pub state: TransferState,
    pub progress: MonitorSnapshot,
    /// Speed estimates after each accepted sample, oldest first.
    pub speed_history: Vec<SpeedEstimate>,
    pub eta: Eta,
    pub created_at: Instant,
    pub updated_at: Instant,
    pub finished_at: Option<Instant>,
}

impl TransferSnapshot {
    pub fn bytes(&self) -> u64 {
        self.progress.bytes
    }

    pub fn speed(&self) -> Option<SpeedEstimate> {
        self.progress.speed
    }
}

struct TransferRecord {
    id: TransferId,
    state: TransferState,
    monitor: TransferMonitor,
    speed_history: VecDeque<SpeedEstimate>,
    history_cap: usize,
    last_eta: Eta,
    created_at: Instant,
    updated_at: Instant,
    last_growth_at: Instant,
    finished_at: Option<Instant>,
}

impl TransferRecord {
    fn new(id: TransferId, total: Option<u64>, cfg: &MonitorConfig, now: Instant) -> Self {
        Self {
            id,
            state: TransferState::Queued,
            monitor: TransferMonitor::new(cfg.clone(), total),
            speed_history: VecDeque::new(),
            history_cap: cfg.speed_history.max(1),
            last_eta: Eta::Unknown,
            created_at: now,
            updated_at: now,
            last_growth_at: now,
            finished_at: None,
        }
    }

    fn transition(&mut self, next: TransferState, now: Instant) -> Result<(), TransitionError> {
        let from = self.state.as_str();
        self.state.transition(next)?;
        self.updated_at = now;
        if self.state.is_terminal() {
            self.finished_at = Some(now);
        }
        if self.state == TransferState::Active {
            self.last_growth_at = now;
        }
        tracing::debug!(id = self.id, from, to = %self.state, "transfer state");
        Ok(())
    }

    fn ingest(&mut self, at: Instant, bytes: u64) -> Result<(), TransferError> {
        if self.state.is_terminal() {
            return Err(TransferError::Finished {
                id: self.id,
                state: self.state.as_str(),
            });
        }
        let before = self.monitor.bytes();
        let outcome = self
            .monitor
            .ingest(at.saturating_duration_since(self.created_at), bytes)?;

        if self.state == TransferState::Queued {
            self.transition(TransferState::Active, at)?;
        }
        if bytes > before {
            self.last_growth_at = at;
        }
        if outcome == IngestOutcome::Accepted {
            if let Some(speed) = self.monitor.speed() {
                if self.speed_history.len() == self.history_cap {
                    self.speed_history.pop_front();
                }
                self.speed_history.push_back(speed);
            }
        }
        self.last_eta = self.monitor.eta();
        self.updated_at = at;

        if self.monitor.total().is_some_and(|total| bytes >= total) {
            self.transition(TransferState::Completed, at)?;
        }
        Ok(())
    }

    fn snapshot(&self) -> TransferSnapshot {
        let eta = match self.state {
            TransferState::Completed => Eta::Known(Duration::ZERO),
            _ => self.last_eta,
        };
        TransferSnapshot {
            id: self.id,
            state: self.state.clone(),
            progress: self.monitor.snapshot(),
            speed_history: self.speed_history.iter().copied().collect(),
            eta,
            created_at: self.created_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
        }
    }

    fn is_stalled(&self, now: Instant, timeout: Duration) -> bool {
        self.state == TransferState::Active
            && now.saturating_duration_since(self.last_growth_at) >= timeout
    }
}

/// Owns every transfer record and the tasks that keep them current.
#[derive(Clone)]
pub struct TransferLifecycleManager {
    records: Arc<RwLock<HashMap<TransferId, TransferRecord>>>,
    monitor_cfg: MonitorConfig,
    retention: Duration,
    stall_timeout: Duration,
}

impl TransferLifecycleManager {
    pub fn new(monitor: MonitorConfig, lifecycle: &LifecycleConfig) -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
            monitor_cfg: monitor,
            retention: lifecycle.retention(),
            stall_timeout: lifecycle.stall_timeout(),
        }
    }

    pub fn from_config(cfg: &FerryConfig) -> Self {
        Self::new(cfg.monitor.clone(), &cfg.lifecycle)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TransferId, TransferRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TransferId, TransferRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new transfer in `Queued`.
    pub fn start(&self, id: TransferId, total_bytes: Option<u64>) -> Result<(), TransferError> {
        let mut records = self.write();
        if records.contains_key(&id) {
            return Err(TransferError::AlreadyExists(id));
        }
        records.insert(
            id,
            TransferRecord::new(id, total_bytes, &self.monitor_cfg, Instant::now()),
        );
        tracing::debug!(id, total_bytes, "transfer queued");
        Ok(())
    }

    pub fn record_progress(
        &self,
        id: TransferId,
        bytes: u64,
    ) -> Result<TransferSnapshot, TransferError> {
        self.record_progress_at(id, Instant::now(), bytes)
    }

    /// Feed cumulative `bytes` observed at `at`.
    ///
    /// The first progress activates a queued transfer; reaching the total completes it.
    /// A rejected sample leaves the record untouched.
    pub fn record_progress_at(
        &self,
        id: TransferId,
        at: Instant,
        bytes: u64,
    ) -> Result<TransferSnapshot, TransferError> {
        let mut records = self.write();
        let record = records.get_mut(&id).ok_or(TransferError::NotFound(id))?;
        record.ingest(at, bytes)?;
        Ok(record.snapshot())
    }

    pub fn pause(&self, id: TransferId) -> Result<(), TransferError> {
        self.transition(id, TransferState::Paused)
    }

    pub fn resume(&self, id: TransferId) -> Result<(), TransferError> {
        self.transition(id, TransferState::Active)
    }

    pub fn complete(&self, id: TransferId) -> Result<(), TransferError> {
        self.transition(id, TransferState::Completed)
    }

    pub fn fail(&self, id: TransferId, reason: FailureReason) -> Result<(), TransferError> {
        self.transition(id, TransferState::Failed(reason))
    }

    pub fn cancel(&self, id: TransferId) -> Result<(), TransferError> {
        self.transition(id, TransferState::Cancelled)
    }

    fn transition(&self, id: TransferId, next: TransferState) -> Result<(), TransferError> {
        let mut records = self.write();
        let record = records.get_mut(&id).ok_or(TransferError::NotFound(id))?;
        record.transition(next, Instant::now())?;
        Ok(())
    }

    pub fn snapshot(&self, id: TransferId) -> Option<TransferSnapshot> {
        self.read().get(&id).map(TransferRecord::snapshot)
    }

    pub fn state(&self, id: TransferId) -> Option<TransferState> {
        self.read().get(&id).map(|r| r.state.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop terminal records finished at least the retention window before `now`.
    pub fn sweep(&self, now: Instant) -> usize {
        let retention = self.retention;
        let mut records = self.write();
        let before = records.len();
        records.retain(|_, r| {
            r.finished_at
                .map_or(true, |at| now.saturating_duration_since(at) < retention)
        });
        let removed = before - records.len();
        if removed > 0 {
            tracing::info!(removed, remaining = records.len(), "swept finished transfers");
        }
        removed
    }

    /// Fail every active transfer that has not grown for the stall timeout.
    pub fn check_stalls(&self, now: Instant) -> Vec<TransferId> {
        let mut records = self.write();
        let mut stalled: Vec<TransferId> = records
            .values_mut()
            .filter(|r| r.is_stalled(now, self.stall_timeout))
            .filter_map(|r| stall(r, now))
            .collect();
        stalled.sort_unstable();
        stalled
    }

    fn check_stall(&self, id: TransferId, now: Instant) -> bool {
        let mut records = self.write();
        match records.get_mut(&id) {
            Some(r) if r.is_stalled(now, self.stall_timeout) => stall(r, now).is_some(),
            _ => false,
        }
    }

    /// Poll `feed` every `interval` until the transfer reaches a terminal state.
    ///
    /// Feed errors fail the transfer; out-of-order readings are logged and dropped.
    /// Cancelling `cancel` moves the transfer to `Cancelled` and keeps its samples
    /// until swept. The task yields the final state, or `None` if the record
    /// disappeared underneath it.
    pub fn spawn_poller(
        &self,
        id: TransferId,
        feed: Arc<dyn ProgressFeed>,
        interval: Duration,
        cancel: CancelToken,
    ) -> JoinHandle<Option<TransferState>> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_TICK));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                let polled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    polled = async {
                        ticker.tick().await;
                        feed.poll().await
                    } => Some(polled),
                };
                let Some(polled) = polled else {
                    if let Err(e) = manager.cancel(id) {
                        tracing::debug!(id, error = %e, "cancel after stop");
                    }
                    break;
                };

                let now = Instant::now();
                match polled {
                    Ok(bytes) => match manager.record_progress_at(id, now, bytes) {
                        Ok(_) => {}
                        Err(TransferError::Ingest(e)) => {
                            tracing::warn!(id, error = %e, "dropping progress reading");
                        }
                        Err(e) => {
                            tracing::debug!(id, error = %e, "poller stopping");
                            break;
                        }
                    },
                    Err(e) => {
                        tracing::warn!(id, error = %format!("{:#}", e), "progress feed failed");
                        if let Err(e) = manager.fail(id, FailureReason::Feed(format!("{:#}", e))) {
                            tracing::debug!(id, error = %e, "fail after feed error");
                        }
                        break;
                    }
                }

                if manager.check_stall(id, now) {
                    break;
                }
                if manager.state(id).map_or(true, |s| s.is_terminal()) {
                    break;
                }
            }
            manager.state(id)
        })
    }

    /// Run [`sweep`](Self::sweep) every `interval` until cancelled.
    pub fn spawn_sweeper(&self, interval: Duration, cancel: CancelToken) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(MIN_TICK));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        manager.sweep(Instant::now());
                    }
                }
            }
        })
    }
}

fn stall(record: &mut TransferRecord, now: Instant) -> Option<TransferId> {
    match record.transition(TransferState::Failed(FailureReason::Stalled), now) {
        Ok(()) => {
            tracing::warn!(id = record.id, bytes = record.monitor.bytes(), "transfer stalled");
            Some(record.id)
        }
        Err(_) => None,
    }
}

//! Passive race telemetry.
//!
//! The race path hands records to [`TelemetryRecorder::record`], which never
//! blocks: records travel over a bounded channel to a background worker that owns
//! the history. When the channel is full the record is dropped. Nothing here
//! influences which artifact a race returns.

mod history;
mod persist;

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use history::{MethodStats, RaceRecord, TelemetryHistory};

/// Cheap, cloneable handle used by racers to submit records and by callers to read them.
#[derive(Debug, Clone)]
pub struct TelemetryRecorder {
    tx: mpsc::Sender<RaceRecord>,
    history: Arc<RwLock<TelemetryHistory>>,
}

/// Owns the background task. Call [`TelemetryWorker::finish`] after dropping every
/// recorder handle to drain pending records.
#[derive(Debug)]
pub struct TelemetryWorker {
    handle: JoinHandle<()>,
    history: Arc<RwLock<TelemetryHistory>>,
}

impl TelemetryRecorder {
    /// Start a worker with an empty history. Must be called inside a tokio runtime.
    pub fn spawn(capacity: usize, per_category: usize) -> (Self, TelemetryWorker) {
        Self::spawn_with_history(capacity, TelemetryHistory::new(per_category))
    }

    /// Start a worker seeded with previously persisted history.
    pub fn spawn_with_history(
        capacity: usize,
        history: TelemetryHistory,
    ) -> (Self, TelemetryWorker) {
        let (tx, mut rx) = mpsc::channel::<RaceRecord>(capacity.max(1));
        let history = Arc::new(RwLock::new(history));
        let sink = Arc::clone(&history);
        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                sink.write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(record);
            }
        });
        (
            Self {
                tx,
                history: Arc::clone(&history),
            },
            TelemetryWorker { handle, history },
        )
    }

    /// Submit a record without waiting. Returns false if it was dropped.
    pub fn record(&self, record: RaceRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(rec)) => {
                tracing::debug!(category = %rec.category, "telemetry queue full; record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn history(&self, category: &str) -> Vec<RaceRecord> {
        self.read(|h| h.records(category))
    }

    pub fn method_stats(&self, category: &str) -> Vec<MethodStats> {
        self.read(|h| h.method_stats(category))
    }

    /// Suggested registration order for `names` based on past wins in `category`.
    pub fn preferred_order(&self, category: &str, names: &[String]) -> Vec<String> {
        self.read(|h| h.preferred_order(category, names))
    }

    pub fn snapshot(&self) -> TelemetryHistory {
        self.read(TelemetryHistory::clone)
    }

    fn read<T>(&self, f: impl FnOnce(&TelemetryHistory) -> T) -> T {
        f(&self.history.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TelemetryWorker {
    /// Wait for the worker to drain (all recorder handles must be dropped) and
    /// return the final history.
    pub async fn finish(self) -> TelemetryHistory {
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "telemetry worker ended abnormally");
        }
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

//! Transfer progress: sample windows, speed and ETA estimation, and the
//! lifecycle of tracked transfers.

mod feed;
mod lifecycle;
mod monitor;
mod sample;
mod state;

pub use feed::{FileGrowthFeed, ProgressFeed};
pub use lifecycle::{TransferError, TransferId, TransferLifecycleManager, TransferSnapshot};
pub use monitor::{
    Eta, IngestError, IngestOutcome, MonitorSnapshot, SpeedEstimate, TransferMonitor, Trend,
};
pub use sample::TransferSample;
pub use state::{FailureReason, TransferState, TransitionError};

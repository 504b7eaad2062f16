//! Transfer state machine.

use std::fmt;

/// Why a transfer ended in [`TransferState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No byte growth for the stall timeout.
    Stalled,
    /// The progress feed reported an error.
    Feed(String),
    Other(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Stalled => f.write_str("stalled"),
            FailureReason::Feed(e) => write!(f, "feed error: {}", e),
            FailureReason::Other(e) => f.write_str(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Queued,
    Active,
    Paused,
    Completed,
    Failed(FailureReason),
    Cancelled,
}

impl TransferState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferState::Queued => "queued",
            TransferState::Active => "active",
            TransferState::Paused => "paused",
            TransferState::Completed => "completed",
            TransferState::Failed(_) => "failed",
            TransferState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Failed(_) | TransferState::Cancelled
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(&self, next: &TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Queued, Active) | (Active, Paused) | (Paused, Active) => true,
            (Queued | Active | Paused, Completed | Failed(_) | Cancelled) => true,
            _ => false,
        }
    }

    /// Validate and apply a transition.
    pub fn transition(&mut self, next: TransferState) -> Result<(), TransitionError> {
        if !self.can_transition_to(&next) {
            return Err(TransitionError {
                from: self.as_str(),
                to: next.as_str(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Failed(reason) => write!(f, "failed ({})", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition from {from} to {to}")]
pub struct TransitionError {
    pub from: &'static str,
    pub to: &'static str,
}

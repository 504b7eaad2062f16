//! Open-resource accounting for strategies.
//!
//! Every handle a strategy holds (child process, temp file, decode buffer) is
//! represented by a [`ResourceGuard`]; dropping the guard releases it. After a race,
//! `in_use() == 0` means nothing leaked, whichever way each strategy ended.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared counter of live resource guards.
#[derive(Debug, Clone, Default)]
pub struct ResourceGauge {
    in_use: Arc<AtomicUsize>,
}

impl ResourceGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resources currently held.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Register one held resource; it is released when the guard drops.
    pub fn acquire(&self, label: &'static str) -> ResourceGuard {
        self.in_use.fetch_add(1, Ordering::AcqRel);
        tracing::trace!(resource = label, "acquired");
        ResourceGuard {
            in_use: Arc::clone(&self.in_use),
            label,
        }
    }
}

/// Releases its slot in the gauge when dropped.
#[derive(Debug)]
pub struct ResourceGuard {
    in_use: Arc<AtomicUsize>,
    label: &'static str,
}

impl ResourceGuard {
    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        self.in_use.fetch_sub(1, Ordering::AcqRel);
        tracing::trace!(resource = self.label, "released");
    }
}

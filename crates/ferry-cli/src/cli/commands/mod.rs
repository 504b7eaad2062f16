//! CLI command handlers, one per file.

mod extract;
mod stats;
mod watch;

pub use extract::{run_extract, ExtractOptions};
pub use stats::run_stats;
pub use watch::run_watch;

/// Persisted race records kept per category.
const HISTORY_PER_CATEGORY: usize = 200;

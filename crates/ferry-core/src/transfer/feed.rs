//! Sources of cumulative byte counts for the transfer poller.

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;

/// Reports how many bytes a transfer has moved so far.
#[async_trait]
pub trait ProgressFeed: Send + Sync {
    async fn poll(&self) -> anyhow::Result<u64>;
}

/// Size of a file being written by some other process.
///
/// A file that does not exist yet reads as zero bytes.
#[derive(Debug, Clone)]
pub struct FileGrowthFeed {
    path: PathBuf,
}

impl FileGrowthFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ProgressFeed for FileGrowthFeed {
    async fn poll(&self) -> anyhow::Result<u64> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e).with_context(|| format!("stat {}", self.path.display())),
        }
    }
}

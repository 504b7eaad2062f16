//! `ferry watch` – follow a growing file and print speed, trend and ETA.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ferry_core::config::FerryConfig;
use ferry_core::control::CancelToken;
use ferry_core::transfer::{
    FileGrowthFeed, TransferId, TransferLifecycleManager, TransferSnapshot, TransferState,
};

const WATCH_ID: TransferId = 1;

pub async fn run_watch(
    cfg: &FerryConfig,
    path: &Path,
    total: u64,
    interval_ms: Option<u64>,
) -> Result<()> {
    let interval = interval_ms
        .map(|ms| Duration::from_millis(ms.max(1)))
        .unwrap_or_else(|| cfg.lifecycle.poll_interval());
    let manager = TransferLifecycleManager::from_config(cfg);
    manager.start(WATCH_ID, Some(total))?;

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted; cancelling watch");
                cancel.cancel();
            }
        })
    };

    let feed = Arc::new(FileGrowthFeed::new(path));
    let mut poller = manager.spawn_poller(WATCH_ID, feed, interval, cancel);
    let mut ticker = tokio::time::interval(interval);
    let final_state = loop {
        tokio::select! {
            res = &mut poller => break res.context("watch task")?,
            _ = ticker.tick() => {
                if let Some(snap) = manager.snapshot(WATCH_ID) {
                    println!("{}", format_progress(&snap));
                }
            }
        }
    };
    ctrl_c.abort();

    if let Some(snap) = manager.snapshot(WATCH_ID) {
        println!("{}", format_progress(&snap));
    }
    match final_state {
        Some(TransferState::Completed) | Some(TransferState::Cancelled) => Ok(()),
        Some(TransferState::Failed(reason)) => anyhow::bail!("transfer failed: {}", reason),
        Some(other) => anyhow::bail!("watch ended while transfer was {}", other),
        None => anyhow::bail!("transfer record disappeared"),
    }
}

/// One status line: state, progress, smoothed speed, trend and ETA.
fn format_progress(snap: &TransferSnapshot) -> String {
    let done_mib = snap.bytes() as f64 / 1_048_576.0;
    let total = snap
        .progress
        .total
        .map(|t| format!("{:.1}", t as f64 / 1_048_576.0))
        .unwrap_or_else(|| "?".to_string());
    let pct = snap
        .progress
        .fraction()
        .map(|f| format!("{:.1}%", f * 100.0))
        .unwrap_or_else(|| "-".to_string());
    let (rate, trend) = match snap.speed() {
        Some(s) => (
            format!("{:.2} MiB/s", s.bytes_per_sec / 1_048_576.0),
            s.trend.to_string(),
        ),
        None => ("- MiB/s".to_string(), "-".to_string()),
    };
    format!(
        "{:<10} {:.1} / {} MiB ({})  {}  {}  ETA {}",
        snap.state.as_str(),
        done_mib,
        total,
        pct,
        rate,
        trend,
        snap.eta
    )
}

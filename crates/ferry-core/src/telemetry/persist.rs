//! Persist telemetry history to disk (JSON under XDG state dir) so ordering hints survive runs.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::history::TelemetryHistory;

impl TelemetryHistory {
    /// Default path for the telemetry file: `~/.local/state/ferry/telemetry.json`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(crate::config::state_dir()?.join("telemetry.json"))
    }

    /// Save history to the given path (creates parent dir if needed).
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("serialize telemetry")?;
        std::fs::write(path, json)
            .with_context(|| format!("write telemetry: {}", path.display()))?;
        Ok(())
    }

    /// Load history from the given path. Missing file returns None. The per-category
    /// bound from config wins over the persisted one; excess entries are trimmed.
    pub fn load_from_path(path: &Path, per_category: usize) -> Result<Option<TelemetryHistory>> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read telemetry: {}", path.display()))
            }
        };
        let persisted: TelemetryHistory = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse telemetry: {}", path.display()))?;
        let mut history = TelemetryHistory::new(per_category);
        let mut categories: Vec<_> = persisted.entries.into_iter().collect();
        categories.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, queue) in categories {
            for rec in queue {
                history.push(rec);
            }
        }
        Ok(Some(history))
    }
}

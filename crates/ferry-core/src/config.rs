use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Race timing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    /// Global deadline for one race, in milliseconds.
    pub deadline_ms: u64,
    /// Window after the first accepted success during which an earlier-registered
    /// strategy may still claim the win.
    pub tie_window_ms: u64,
    /// How long cancelled strategies get to release resources before being aborted.
    pub cancel_grace_ms: u64,
    /// Bounded queue between the race path and the telemetry worker.
    pub telemetry_capacity: usize,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 10_000,
            tie_window_ms: 2,
            cancel_grace_ms: 500,
            telemetry_capacity: 64,
        }
    }
}

impl RaceConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn tie_window(&self) -> Duration {
        Duration::from_millis(self.tie_window_ms)
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.cancel_grace_ms)
    }
}

/// Acceptance thresholds for candidate artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Artifacts must be strictly longer than this (seconds).
    pub min_duration_secs: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_duration_secs: 0.5,
        }
    }
}

/// Shape of the synthetic placeholder used when every strategy loses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            duration_secs: 1.0,
            sample_rate: 16_000,
            channels: 1,
        }
    }
}

/// Smoothing, trend and projection tuning for the transfer monitor.
///
/// These are empirically chosen; none of them is load-bearing for correctness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Ring buffer capacity (samples, not intervals).
    pub window_size: usize,
    /// Samples closer than this to the previous accepted one are skipped.
    pub min_sample_interval_ms: u64,
    /// recent/earlier ratio above which the trend is Increasing.
    pub increase_ratio: f64,
    /// recent/earlier ratio below which the trend is Decreasing.
    pub decrease_ratio: f64,
    /// Upper bound on the speed-up assumed for an Increasing trend.
    pub increase_cap: f64,
    /// Factor applied to the smoothed speed for a Decreasing trend.
    pub decrease_factor: f64,
    /// How many past speed estimates a transfer record keeps.
    pub speed_history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            min_sample_interval_ms: 100,
            increase_ratio: 1.1,
            decrease_ratio: 0.9,
            increase_cap: 1.2,
            decrease_factor: 0.95,
            speed_history: 32,
        }
    }
}

impl MonitorConfig {
    pub fn min_sample_interval(&self) -> Duration {
        Duration::from_millis(self.min_sample_interval_ms)
    }
}

/// Transfer record retention and polling cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Terminal records older than this are swept.
    pub retention_hours: u64,
    /// Active transfers with no byte growth for this long are failed as stalled.
    pub stall_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub sweep_interval_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            retention_hours: 24,
            stall_timeout_secs: 60,
            poll_interval_ms: 1_000,
            sweep_interval_secs: 600,
        }
    }
}

impl LifecycleConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours.saturating_mul(3_600))
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// One external extraction command raced by `ferry extract`.
///
/// `args` may contain `{input}`, `{output}`, `{sample_rate}`, `{channels}` and
/// `{max_duration}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandStrategyConfig {
    pub name: String,
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Optional per-strategy timeout, independent of the race deadline.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Global configuration loaded from `~/.config/ferry/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FerryConfig {
    #[serde(default)]
    pub race: RaceConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Command strategies in priority order (earlier wins ties).
    #[serde(default)]
    pub strategies: Vec<CommandStrategyConfig>,
}

/// Ferry's XDG state directory: `~/.local/state/ferry`.
pub fn state_dir() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ferry")?;
    Ok(xdg_dirs.get_state_home().join("ferry"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ferry")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FerryConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FerryConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: FerryConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

//! Smoothed speed, trend and ETA over a bounded window of progress samples.
//!
//! Speed is a linearly weighted mean of per-interval throughputs (newest weighs
//! most). Trend compares the mean of the recent half of the intervals with the
//! earlier half. The ETA projects the smoothed speed along that trend; with too
//! few samples it falls back to the last interval's speed.

use std::fmt;
use std::time::Duration;

use super::sample::{SampleWindow, TransferSample};
use crate::config::MonitorConfig;

/// Below this many samples the ETA uses the instantaneous speed.
const MIN_SAMPLES_FOR_PROJECTION: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        })
    }
}

/// Smoothed throughput in bytes per second, with its direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedEstimate {
    pub bytes_per_sec: f64,
    pub trend: Trend,
}

/// Estimated time to completion. Never negative, never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eta {
    Known(Duration),
    Unknown,
}

impl Eta {
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            Eta::Known(d) => Some(*d),
            Eta::Unknown => None,
        }
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Eta::Known(d) => {
                let secs = d.as_secs();
                if secs >= 3_600 {
                    write!(f, "{}h{:02}m", secs / 3_600, (secs % 3_600) / 60)
                } else if secs >= 60 {
                    write!(f, "{}m{:02}s", secs / 60, secs % 60)
                } else {
                    write!(f, "{:.1}s", d.as_secs_f64())
                }
            }
            Eta::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error(
        "non-monotonic sample: {bytes} bytes at {at:?} after {prev_bytes} bytes at {prev_at:?}"
    )]
    NonMonotonic {
        at: Duration,
        bytes: u64,
        prev_at: Duration,
        prev_bytes: u64,
    },
}

/// Whether an ingested sample entered the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Accepted,
    /// Too close to the previous accepted sample; only the byte position moved.
    Skipped,
}

/// Immutable copy of a monitor's derived values.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSnapshot {
    pub bytes: u64,
    pub total: Option<u64>,
    pub samples: usize,
    pub skipped: u64,
    pub speed: Option<SpeedEstimate>,
    pub eta: Eta,
}

impl MonitorSnapshot {
    /// Fraction complete in [0.0, 1.0], when the total is known.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes as f64 / total as f64).min(1.0))
    }
}

/// Intermediate numbers shared by speed and ETA.
struct Analysis {
    smoothed: f64,
    instantaneous: f64,
    trend: Trend,
    ratio: f64,
}

/// Single-writer progress estimator for one transfer.
#[derive(Debug, Clone)]
pub struct TransferMonitor {
    cfg: MonitorConfig,
    total: Option<u64>,
    window: SampleWindow,
    latest: Option<TransferSample>,
    skipped: u64,
}

impl TransferMonitor {
    pub fn new(cfg: MonitorConfig, total: Option<u64>) -> Self {
        Self {
            window: SampleWindow::new(cfg.window_size),
            cfg,
            total,
            latest: None,
            skipped: 0,
        }
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    /// Latest known cumulative byte count, including skipped samples.
    pub fn bytes(&self) -> u64 {
        self.latest.map_or(0, |s| s.bytes)
    }

    pub fn latest(&self) -> Option<TransferSample> {
        self.latest
    }

    pub fn samples(&self) -> Vec<TransferSample> {
        self.window.iter().copied().collect()
    }

    /// Record cumulative `bytes` observed `at` (offset from the transfer's start).
    pub fn ingest(&mut self, at: Duration, bytes: u64) -> Result<IngestOutcome, IngestError> {
        if let Some(prev) = self.latest {
            if at < prev.at || bytes < prev.bytes {
                return Err(IngestError::NonMonotonic {
                    at,
                    bytes,
                    prev_at: prev.at,
                    prev_bytes: prev.bytes,
                });
            }
        }
        let sample = TransferSample::new(at, bytes);
        self.latest = Some(sample);

        if let Some(last) = self.window.last() {
            let gap = at.saturating_sub(last.at);
            if gap.is_zero() || gap < self.cfg.min_sample_interval() {
                self.skipped += 1;
                return Ok(IngestOutcome::Skipped);
            }
        }
        self.window.push(sample);
        Ok(IngestOutcome::Accepted)
    }

    /// Smoothed speed and trend; `None` until the window holds one interval.
    pub fn speed(&self) -> Option<SpeedEstimate> {
        self.analyze().map(|a| SpeedEstimate {
            bytes_per_sec: a.smoothed,
            trend: a.trend,
        })
    }

    /// Time to move `remaining` more bytes at the projected speed.
    pub fn eta_for(&self, remaining: u64) -> Eta {
        if remaining == 0 {
            return Eta::Known(Duration::ZERO);
        }
        let Some(a) = self.analyze() else {
            return Eta::Unknown;
        };
        let projected = if self.window.len() < MIN_SAMPLES_FOR_PROJECTION {
            a.instantaneous
        } else {
            match a.trend {
                Trend::Increasing => {
                    a.smoothed * a.ratio.clamp(1.0, self.cfg.increase_cap.max(1.0))
                }
                Trend::Decreasing => a.smoothed * self.cfg.decrease_factor,
                Trend::Stable => a.smoothed,
            }
        };
        if !projected.is_finite() || projected <= 0.0 {
            return Eta::Unknown;
        }
        match Duration::try_from_secs_f64(remaining as f64 / projected) {
            Ok(d) => Eta::Known(d),
            Err(_) => Eta::Unknown,
        }
    }

    /// ETA for the rest of the transfer; unknown without a total.
    pub fn eta(&self) -> Eta {
        match self.total {
            Some(total) => self.eta_for(total.saturating_sub(self.bytes())),
            None => Eta::Unknown,
        }
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            bytes: self.bytes(),
            total: self.total,
            samples: self.window.len(),
            skipped: self.skipped,
            speed: self.speed(),
            eta: self.eta(),
        }
    }

    fn analyze(&self) -> Option<Analysis> {
        let rates = self.window.rates();
        let instantaneous = *rates.last()?;
        let m = rates.len();

        let weight_sum = (m * (m + 1)) as f64 / 2.0;
        let smoothed = rates
            .iter()
            .enumerate()
            .map(|(i, r)| r * (i + 1) as f64)
            .sum::<f64>()
            / weight_sum;

        let (trend, ratio) = if m < 2 {
            (Trend::Stable, 1.0)
        } else {
            let (earlier, recent) = rates.split_at(m / 2);
            let earlier_mean = mean(earlier);
            let recent_mean = mean(recent);
            if earlier_mean <= 0.0 {
                if recent_mean > 0.0 {
                    (Trend::Increasing, f64::INFINITY)
                } else {
                    (Trend::Stable, 1.0)
                }
            } else {
                let ratio = recent_mean / earlier_mean;
                let trend = if ratio > self.cfg.increase_ratio {
                    Trend::Increasing
                } else if ratio < self.cfg.decrease_ratio {
                    Trend::Decreasing
                } else {
                    Trend::Stable
                };
                (trend, ratio)
            }
        };

        Some(Analysis {
            smoothed,
            instantaneous,
            trend,
            ratio,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

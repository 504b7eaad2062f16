//! Strategy that shells out to an external tool (e.g. ffmpeg) and probes its WAV output.
//!
//! Each run writes to its own partial file so concurrent strategies never share
//! an output path. The child is spawned with `kill_on_drop`, and the partial file
//! is owned by a guard that deletes it unless the run succeeded, so cancellation
//! or an outright abort leaves nothing behind. A successful output belongs to the
//! racer, which discards it unless it wins.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::artifact::{Artifact, StrategyOutcome};
use super::gauge::{ResourceGauge, ResourceGuard};
use super::request::{ExtractionRequest, SinkDescriptor};
use super::strategy::Strategy;
use crate::control::CancelToken;
use crate::config::CommandStrategyConfig;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Runs `program args...` with request placeholders substituted.
#[derive(Debug, Clone)]
pub struct CommandStrategy {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    gauge: ResourceGauge,
}

impl CommandStrategy {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args,
            timeout: None,
            gauge: ResourceGauge::new(),
        }
    }

    pub fn from_config(cfg: &CommandStrategyConfig) -> Self {
        Self::new(cfg.name.clone(), cfg.program.clone(), cfg.args.clone())
            .with_timeout(cfg.timeout_ms.map(Duration::from_millis))
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share a gauge so callers can verify child processes and partial files are released.
    pub fn with_gauge(mut self, gauge: ResourceGauge) -> Self {
        self.gauge = gauge;
        self
    }

    /// Expand placeholders for one run.
    ///
    /// Without a max duration, an argument using `{max_duration}` is dropped together
    /// with the flag right before it (e.g. `-t {max_duration}`).
    pub fn render_args(&self, request: &ExtractionRequest, output: &Path) -> Vec<String> {
        let c = request.constraints();
        let input = request.source().as_arg();
        let output = output.to_string_lossy();
        let max_duration = c.max_duration.map(|d| format!("{:.3}", d.as_secs_f64()));

        let mut rendered: Vec<String> = Vec::with_capacity(self.args.len());
        for arg in &self.args {
            if arg.contains("{max_duration}") && max_duration.is_none() {
                if rendered.last().is_some_and(|prev| prev.starts_with('-')) {
                    rendered.pop();
                }
                continue;
            }
            let mut a = arg
                .replace("{input}", &input)
                .replace("{output}", &output)
                .replace("{sample_rate}", &c.sample_rate.to_string())
                .replace("{channels}", &c.channels.to_string());
            if let Some(d) = &max_duration {
                a = a.replace("{max_duration}", d);
            }
            rendered.push(a);
        }
        rendered
    }

    /// Per-run output path: next to the sink for file sinks, in the temp dir otherwise.
    fn partial_path(&self, request: &ExtractionRequest) -> PathBuf {
        let run = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        let slug: String = self
            .name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        let file_name = format!(".ferry-{}-{}-{}.partial.wav", std::process::id(), slug, run);
        match request.sink() {
            SinkDescriptor::File(p) => p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .map(|d| d.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
            SinkDescriptor::Memory => std::env::temp_dir().join(file_name),
        }
    }

    /// Kill and reap the child. `kill()` waits for exit, so no zombie is left behind.
    async fn stop(&self, child: &mut tokio::process::Child) {
        if let Err(e) = child.kill().await {
            tracing::debug!(strategy = %self.name, error = %e, "kill after stop failed");
        }
    }
}

/// Deletes the partial output on drop unless the run succeeded.
struct PartialOutput {
    path: PathBuf,
    keep: bool,
    _held: ResourceGuard,
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

enum Ended {
    Exited(std::io::Result<ExitStatus>),
    Cancelled,
    TimedOut,
}

#[async_trait]
impl Strategy for CommandStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, request: &ExtractionRequest, cancel: CancelToken) -> StrategyOutcome {
        let mut partial = PartialOutput {
            path: self.partial_path(request),
            keep: false,
            _held: self.gauge.acquire("partial-output"),
        };
        let args = self.render_args(request, &partial.path);
        tracing::debug!(strategy = %self.name, program = %self.program, ?args, "spawning");

        let mut child = match Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return StrategyOutcome::fatal(format!("{} not found", self.program));
            }
            Err(e) => return StrategyOutcome::transient(format!("spawn {}: {}", self.program, e)),
        };
        let child_held = self.gauge.acquire("child");

        let timer = async {
            match self.timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending::<()>().await,
            }
        };
        let ended = tokio::select! {
            status = child.wait() => Ended::Exited(status),
            _ = cancel.cancelled() => Ended::Cancelled,
            _ = timer => Ended::TimedOut,
        };

        let status = match ended {
            Ended::Exited(status) => status,
            Ended::Cancelled => {
                self.stop(&mut child).await;
                return StrategyOutcome::transient("cancelled");
            }
            Ended::TimedOut => {
                self.stop(&mut child).await;
                return StrategyOutcome::transient(format!(
                    "timed out after {:?}",
                    self.timeout.unwrap_or_default()
                ));
            }
        };
        drop(child_held);

        match status {
            Ok(s) if s.success() => {}
            Ok(s) => return StrategyOutcome::transient(format!("{} exited with {}", self.program, s)),
            Err(e) => return StrategyOutcome::transient(format!("wait {}: {}", self.program, e)),
        }
        if cancel.is_cancelled() {
            return StrategyOutcome::transient("cancelled");
        }

        let path = partial.path.clone();
        let method = self.name.clone();
        let probed = tokio::task::spawn_blocking(move || Artifact::probe_wav(&path, &method)).await;
        match probed {
            Ok(Ok(artifact)) => {
                partial.keep = true;
                StrategyOutcome::Success(artifact)
            }
            Ok(Err(e)) => StrategyOutcome::transient(format!("unreadable output: {:#}", e)),
            Err(e) => StrategyOutcome::transient(format!("probe task: {}", e)),
        }
    }
}

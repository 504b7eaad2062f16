//! Artifacts, strategy outcomes and race results.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Method tag carried by synthetic placeholder artifacts.
pub const FALLBACK_METHOD: &str = "fallback";

/// Where an artifact's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutput {
    /// Encoded bytes held in memory.
    Inline(Vec<u8>),
    /// A file written by the producing strategy, with its size at probe time.
    File { path: PathBuf, len: u64 },
}

impl ArtifactOutput {
    /// Size of the output in bytes.
    pub fn len(&self) -> u64 {
        match self {
            ArtifactOutput::Inline(bytes) => bytes.len() as u64,
            ArtifactOutput::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver the output to `dest`: inline bytes are written, files are moved
    /// (copied then removed when a rename is not possible). Returns the output as
    /// it exists after delivery.
    pub fn deliver_to(&self, dest: &Path) -> Result<ArtifactOutput> {
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        match self {
            ArtifactOutput::Inline(bytes) => {
                std::fs::write(dest, bytes)
                    .with_context(|| format!("write artifact: {}", dest.display()))?;
            }
            ArtifactOutput::File { path, .. } if path == dest => {}
            ArtifactOutput::File { path, .. } => {
                if std::fs::rename(path, dest).is_err() {
                    std::fs::copy(path, dest).with_context(|| {
                        format!("copy {} -> {}", path.display(), dest.display())
                    })?;
                    let _ = std::fs::remove_file(path);
                }
            }
        }
        Ok(ArtifactOutput::File {
            path: dest.to_path_buf(),
            len: self.len(),
        })
    }
}

/// Structured output of a successful strategy (or the fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub output: ArtifactOutput,
    pub duration: Duration,
    pub sample_rate: u32,
    pub channels: u16,
    /// Which strategy produced this, or [`FALLBACK_METHOD`].
    pub method: String,
}

impl Artifact {
    pub fn is_fallback(&self) -> bool {
        self.method == FALLBACK_METHOD
    }

    /// Drop an artifact that will never be delivered, removing its output file.
    pub fn discard(self) {
        if let ArtifactOutput::File { path, .. } = &self.output {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    tracing::debug!(method = %self.method, path = %path.display(), "discarded output")
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "remove discarded output")
                }
            }
        }
    }

    /// Build an artifact by reading the header of a WAV file written by `method`.
    pub fn probe_wav(path: &Path, method: &str) -> Result<Self> {
        let len = std::fs::metadata(path)
            .with_context(|| format!("stat output: {}", path.display()))?
            .len();
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("read wav header: {}", path.display()))?;
        let spec = reader.spec();
        // duration() is in frames per channel.
        let frames = reader.duration();
        let duration = if spec.sample_rate == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(frames as f64 / spec.sample_rate as f64)
        };
        Ok(Self {
            output: ArtifactOutput::File {
                path: path.to_path_buf(),
                len,
            },
            duration,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            method: method.to_string(),
        })
    }
}

/// Why a strategy failed, for telemetry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// This attempt failed; the strategy may work next time.
    Transient,
    /// Hard incompatibility (e.g. missing tool, unsupported source).
    Fatal,
}

/// What a single strategy reports back to the racer.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Success(Artifact),
    Failure { reason: String, kind: FailureKind },
}

impl StrategyOutcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        StrategyOutcome::Failure {
            reason: reason.into(),
            kind: FailureKind::Transient,
        }
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        StrategyOutcome::Failure {
            reason: reason.into(),
            kind: FailureKind::Fatal,
        }
    }
}

/// The single answer a race hands back to its caller.
#[derive(Debug, Clone)]
pub struct RaceResult {
    pub artifact: Artifact,
    /// Time from race start until the result was decided.
    pub elapsed: Duration,
    /// Every strategy launched, in registration order.
    pub attempted: Vec<String>,
    /// Strategies still running when the race was decided and therefore cancelled.
    pub cancelled: Vec<String>,
}

impl RaceResult {
    pub fn method(&self) -> &str {
        &self.artifact.method
    }

    pub fn is_fallback(&self) -> bool {
        self.artifact.is_fallback()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: u32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * channels as u32 {
            w.write_sample(0i16).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn probe_wav_reads_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_wav(&path, 8_000, 2, 16_000);
        let a = Artifact::probe_wav(&path, "ffmpeg").unwrap();
        assert_eq!(a.sample_rate, 8_000);
        assert_eq!(a.channels, 2);
        assert_eq!(a.duration, Duration::from_secs(2));
        assert_eq!(a.method, "ffmpeg");
        assert!(a.output.len() > 44);
        assert!(!a.is_fallback());
    }

    #[test]
    fn probe_wav_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wav").unwrap();
        assert!(Artifact::probe_wav(&path, "x").is_err());
    }

    #[test]
    fn discard_removes_file_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("loser.wav");
        write_wav(&path, 8_000, 1, 800);
        Artifact::probe_wav(&path, "copy").unwrap().discard();
        assert!(!path.exists());

        // Inline output and already-missing files are fine.
        Artifact {
            output: ArtifactOutput::File {
                path: dir.path().join("gone.wav"),
                len: 0,
            },
            duration: Duration::ZERO,
            sample_rate: 8_000,
            channels: 1,
            method: "copy".into(),
        }
        .discard();
    }

    #[test]
    fn deliver_inline_then_move_file() {
        let dir = tempdir().unwrap();
        let inline = ArtifactOutput::Inline(vec![1, 2, 3]);
        let first = dir.path().join("nested").join("out.bin");
        let delivered = inline.deliver_to(&first).unwrap();
        assert_eq!(std::fs::read(&first).unwrap(), vec![1, 2, 3]);
        assert_eq!(delivered.len(), 3);

        let moved = dir.path().join("moved.bin");
        let delivered = delivered.deliver_to(&moved).unwrap();
        assert_eq!(std::fs::read(&moved).unwrap(), vec![1, 2, 3]);
        assert!(!first.exists());
        // Delivering onto itself is a no-op.
        delivered.deliver_to(&moved).unwrap();
        assert!(moved.exists());
    }
}

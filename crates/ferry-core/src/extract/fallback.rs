//! Deterministic placeholder used when no real strategy wins.

use std::io::Cursor;
use std::time::Duration;

use super::artifact::{Artifact, ArtifactOutput, FALLBACK_METHOD};
use super::request::ExtractionRequest;
use crate::config::FallbackConfig;

/// Longest placeholder we are willing to encode in memory.
const MAX_FALLBACK_SECS: f64 = 60.0;
/// Margin above the validator minimum so the placeholder always clears it.
const MIN_DURATION_MARGIN_SECS: f64 = 0.1;
/// Highest sample rate the placeholder is encoded at.
const MAX_FALLBACK_RATE: u32 = 384_000;
const DEFAULT_FALLBACK_RATE: u32 = 16_000;

/// Builds a short silent 16-bit PCM WAV tagged [`FALLBACK_METHOD`].
#[derive(Debug, Clone)]
pub struct FallbackSynthesizer {
    cfg: FallbackConfig,
    min_duration: Duration,
}

impl FallbackSynthesizer {
    /// `min_duration` is the validator's threshold; output is always longer.
    pub fn new(cfg: FallbackConfig, min_duration: Duration) -> Self {
        Self { cfg, min_duration }
    }

    /// Same request in, byte-identical artifact out.
    pub fn synthesize(&self, request: &ExtractionRequest) -> Artifact {
        let c = request.constraints();
        let sample_rate = [c.sample_rate, self.cfg.sample_rate]
            .into_iter()
            .find(|rate| (1..=MAX_FALLBACK_RATE).contains(rate))
            .unwrap_or(DEFAULT_FALLBACK_RATE);
        let channels = match c.channels {
            1 | 2 => c.channels,
            _ => match self.cfg.channels {
                1 | 2 => self.cfg.channels,
                _ => 1,
            },
        };

        let floor = self.min_duration.as_secs_f64() + MIN_DURATION_MARGIN_SECS;
        let mut secs = self.cfg.duration_secs;
        if !secs.is_finite() || secs < floor {
            secs = floor;
        }
        let secs = secs.min(MAX_FALLBACK_SECS.max(floor));
        let frames = (secs * sample_rate as f64).ceil();

        let encoded = match sample_count(frames, channels) {
            Some(samples) => encode_silence(sample_rate, channels, samples)
                .map_err(|e| tracing::error!(error = %e, "fallback wav encoding failed")),
            None => {
                tracing::error!(secs, sample_rate, channels, "fallback too long for a wav data chunk");
                Err(())
            }
        };
        // An empty artifact fails validation and surfaces as FallbackExhausted.
        let (bytes, duration) = match encoded {
            Ok(bytes) => (bytes, Duration::from_secs_f64(frames / sample_rate as f64)),
            Err(()) => (Vec::new(), Duration::ZERO),
        };

        Artifact {
            output: ArtifactOutput::Inline(bytes),
            duration,
            sample_rate,
            channels,
            method: FALLBACK_METHOD.to_string(),
        }
    }
}

/// Interleaved 16-bit sample count, if the data chunk still fits a WAV header.
fn sample_count(frames: f64, channels: u16) -> Option<u32> {
    if !frames.is_finite() || frames < 0.0 || frames > u32::MAX as f64 {
        return None;
    }
    let samples = (frames as u32).checked_mul(u32::from(channels))?;
    samples.checked_mul(2)?.checked_add(44)?;
    Some(samples)
}

fn encode_silence(sample_rate: u32, channels: u16, samples: u32) -> hound::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for _ in 0..samples {
            writer.write_sample(0i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::request::{Constraints, SinkDescriptor, SourceRef};
    use crate::extract::validate::ResultValidator;

    fn request(rate: u32, channels: u16) -> ExtractionRequest {
        ExtractionRequest::new(
            SourceRef::Url("https://cdn.test/a.mp4".into()),
            SinkDescriptor::Memory,
            Constraints {
                max_duration: None,
                sample_rate: rate,
                channels,
            },
        )
    }

    #[test]
    fn fallback_passes_validation() {
        let validator = ResultValidator::default();
        let synth = FallbackSynthesizer::new(FallbackConfig::default(), validator.min_duration());
        let a = synth.synthesize(&request(44_100, 2));
        assert!(a.is_fallback());
        assert_eq!(a.sample_rate, 44_100);
        assert_eq!(a.channels, 2);
        validator.validate(&a).unwrap();
    }

    #[test]
    fn fallback_is_deterministic() {
        let synth = FallbackSynthesizer::new(FallbackConfig::default(), Duration::from_millis(500));
        let a = synth.synthesize(&request(16_000, 1));
        let b = synth.synthesize(&request(16_000, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn invalid_constraints_use_config_defaults() {
        let synth = FallbackSynthesizer::new(FallbackConfig::default(), Duration::from_millis(500));
        let a = synth.synthesize(&request(0, 5));
        assert_eq!(a.sample_rate, 16_000);
        assert_eq!(a.channels, 1);
    }

    #[test]
    fn duration_never_below_validator_minimum() {
        let cfg = FallbackConfig {
            duration_secs: 0.0,
            ..FallbackConfig::default()
        };
        let validator = ResultValidator::new(Duration::from_secs(3));
        let synth = FallbackSynthesizer::new(cfg, validator.min_duration());
        let a = synth.synthesize(&request(8_000, 1));
        assert!(a.duration > Duration::from_secs(3));
        validator.validate(&a).unwrap();
    }

    #[test]
    fn absurd_sample_rate_falls_back_to_config_rate() {
        let validator = ResultValidator::default();
        let synth = FallbackSynthesizer::new(FallbackConfig::default(), validator.min_duration());
        let a = synth.synthesize(&request(3_000_000_000, 2));
        assert_eq!(a.sample_rate, 16_000);
        assert_eq!(a.channels, 2);
        validator.validate(&a).unwrap();

        let cfg = FallbackConfig {
            sample_rate: u32::MAX,
            ..FallbackConfig::default()
        };
        let a = FallbackSynthesizer::new(cfg, validator.min_duration())
            .synthesize(&request(u32::MAX, 1));
        assert_eq!(a.sample_rate, 16_000);
        validator.validate(&a).unwrap();
    }

    #[test]
    fn oversized_placeholder_is_empty_not_a_panic() {
        let validator = ResultValidator::new(Duration::from_secs(1_000_000));
        let synth = FallbackSynthesizer::new(FallbackConfig::default(), validator.min_duration());
        let a = synth.synthesize(&request(384_000, 2));
        assert!(a.output.is_empty());
        assert_eq!(a.duration, Duration::ZERO);
        assert!(!validator.accepts(&a));
    }

    #[test]
    fn inline_bytes_decode_as_wav() {
        let synth = FallbackSynthesizer::new(FallbackConfig::default(), Duration::from_millis(500));
        let a = synth.synthesize(&request(16_000, 1));
        let ArtifactOutput::Inline(bytes) = a.output else {
            panic!("expected inline output");
        };
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16_000);
        assert_eq!(reader.duration(), 16_000);
    }
}

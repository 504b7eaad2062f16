//! `CommandStrategy` against real child processes (unix only: uses `cp`, `sh`, `false`).

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ferry_core::config::FerryConfig;
use ferry_core::extract::{
    ArtifactOutput, CommandStrategy, Constraints, ExtractionRequest, ResourceGauge,
    SharedStrategy, SinkDescriptor, SourceRef, StrategyRacer,
};

fn write_wav(path: &Path, frames: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        writer.write_sample((i % 64) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn request(input: &Path, sink: PathBuf) -> ExtractionRequest {
    ExtractionRequest::new(
        SourceRef::Path(input.to_path_buf()),
        SinkDescriptor::File(sink),
        Constraints::default(),
    )
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn partials(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.to_string_lossy().ends_with(".partial.wav"))
        .collect()
}

#[tokio::test]
async fn copy_wins_and_slow_child_is_killed() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("source.wav");
    write_wav(&input, 16_000);
    let sink = dir.path().join("out/result.wav");
    let gauge = ResourceGauge::new();

    let slow = CommandStrategy::new(
        "slow",
        "sh",
        args(&["-c", "echo partial > \"$0\"; exec sleep 30", "{output}"]),
    )
    .with_gauge(gauge.clone());
    let broken = CommandStrategy::new("broken", "false", vec![]).with_gauge(gauge.clone());
    let copy = CommandStrategy::new("copy", "cp", args(&["{input}", "{output}"]))
        .with_gauge(gauge.clone());
    let strategies: Vec<SharedStrategy> = vec![Arc::new(slow), Arc::new(broken), Arc::new(copy)];

    std::fs::create_dir_all(sink.parent().unwrap()).unwrap();
    let racer = StrategyRacer::from_config(&FerryConfig::default())
        .with_deadline(Duration::from_secs(10));
    let started = std::time::Instant::now();
    let result = racer
        .race_or_fallback(&request(&input, sink.clone()), &strategies)
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(result.method(), "copy");
    assert!(result.cancelled.iter().any(|n| n == "slow"));
    assert_eq!(result.artifact.sample_rate, 8_000);
    assert_eq!(result.artifact.channels, 1);
    assert_eq!(result.artifact.duration, Duration::from_secs(2));
    assert_eq!(gauge.in_use(), 0);

    let delivered = result.artifact.output.deliver_to(&sink).unwrap();
    assert!(matches!(delivered, ArtifactOutput::File { .. }));
    assert!(sink.exists());
    assert!(partials(sink.parent().unwrap()).is_empty());
}

#[tokio::test]
async fn unreadable_output_is_rejected_and_cleaned_up() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("source.wav");
    std::fs::write(&input, b"not a wav").unwrap();
    let sink = dir.path().join("result.wav");

    let copy = CommandStrategy::new("copy", "cp", args(&["{input}", "{output}"]));
    let strategies: Vec<SharedStrategy> = vec![Arc::new(copy)];
    let racer = StrategyRacer::from_config(&FerryConfig::default())
        .with_deadline(Duration::from_secs(10));
    let result = racer
        .race_or_fallback(&request(&input, sink), &strategies)
        .await
        .unwrap();

    assert!(result.is_fallback());
    assert!(partials(dir.path()).is_empty());
}

#[tokio::test]
async fn per_strategy_timeout_kills_child() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("source.wav");
    write_wav(&input, 8_000);
    let gauge = ResourceGauge::new();

    let hang = CommandStrategy::new("hang", "sleep", args(&["30"]))
        .with_timeout(Some(Duration::from_millis(200)))
        .with_gauge(gauge.clone());
    let strategies: Vec<SharedStrategy> = vec![Arc::new(hang)];
    let racer = StrategyRacer::from_config(&FerryConfig::default())
        .with_deadline(Duration::from_secs(10));
    let started = std::time::Instant::now();
    let result = racer
        .race_or_fallback(&request(&input, dir.path().join("out.wav")), &strategies)
        .await
        .unwrap();

    assert!(result.is_fallback());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(gauge.in_use(), 0);
}

#[tokio::test]
async fn too_short_output_is_removed_before_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("source.wav");
    // 0.2 s at 8 kHz: a valid header, below the 0.5 s minimum.
    write_wav(&input, 1_600);
    let gauge = ResourceGauge::new();

    let copy = CommandStrategy::new("copy", "cp", args(&["{input}", "{output}"]))
        .with_gauge(gauge.clone());
    let strategies: Vec<SharedStrategy> = vec![Arc::new(copy)];
    let racer = StrategyRacer::from_config(&FerryConfig::default())
        .with_deadline(Duration::from_secs(10));
    let result = racer
        .race_or_fallback(&request(&input, dir.path().join("result.wav")), &strategies)
        .await
        .unwrap();

    assert!(result.is_fallback());
    assert_eq!(gauge.in_use(), 0);
    assert!(partials(dir.path()).is_empty());
}

#[tokio::test]
async fn losing_copies_are_removed_and_winner_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("source.wav");
    write_wav(&input, 16_000);
    let sink = dir.path().join("result.wav");

    let strategies: Vec<SharedStrategy> = ["first", "second", "third"]
        .into_iter()
        .map(|name| {
            Arc::new(CommandStrategy::new(name, "cp", args(&["{input}", "{output}"])))
                as SharedStrategy
        })
        .collect();
    let racer = StrategyRacer::from_config(&FerryConfig::default())
        .with_deadline(Duration::from_secs(10));
    let result = racer
        .race_or_fallback(&request(&input, sink.clone()), &strategies)
        .await
        .unwrap();

    assert!(!result.is_fallback());
    let ArtifactOutput::File { path: winner, .. } = &result.artifact.output else {
        panic!("expected file output, got {:?}", result.artifact.output);
    };
    assert_eq!(partials(dir.path()), vec![winner.clone()]);

    result.artifact.output.deliver_to(&sink).unwrap();
    assert!(sink.exists());
    assert!(partials(dir.path()).is_empty());
}

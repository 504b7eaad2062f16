//! Tests for `extract`.

use std::path::Path;

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;

#[test]
fn cli_parse_extract_defaults() {
    match parse(&["ferry", "extract", "talk.mp4", "talk.wav"]) {
        CliCommand::Extract {
            source,
            sink,
            deadline_ms,
            max_duration,
            sample_rate,
            channels,
            category,
            learned_order,
        } => {
            assert_eq!(source, "talk.mp4");
            assert_eq!(sink, Path::new("talk.wav"));
            assert!(deadline_ms.is_none());
            assert!(max_duration.is_none());
            assert_eq!(sample_rate, 16_000);
            assert_eq!(channels, 1);
            assert!(category.is_none());
            assert!(!learned_order);
        }
        _ => panic!("expected Extract"),
    }
}

#[test]
fn cli_parse_extract_options() {
    match parse(&[
        "ferry",
        "extract",
        "https://cdn.test/v.webm",
        "out/v.wav",
        "--deadline-ms",
        "2500",
        "--max-duration",
        "30.5",
        "--sample-rate",
        "44100",
        "--channels",
        "2",
        "--category",
        "webm-live",
        "--learned-order",
    ]) {
        CliCommand::Extract {
            source,
            deadline_ms,
            max_duration,
            sample_rate,
            channels,
            category,
            learned_order,
            ..
        } => {
            assert_eq!(source, "https://cdn.test/v.webm");
            assert_eq!(deadline_ms, Some(2500));
            assert_eq!(max_duration, Some(30.5));
            assert_eq!(sample_rate, 44_100);
            assert_eq!(channels, 2);
            assert_eq!(category.as_deref(), Some("webm-live"));
            assert!(learned_order);
        }
        _ => panic!("expected Extract"),
    }
}

#[test]
fn cli_parse_extract_requires_sink() {
    assert!(Cli::try_parse_from(["ferry", "extract", "talk.mp4"]).is_err());
}

#[test]
fn cli_parse_extract_rejects_bad_deadline() {
    assert!(
        Cli::try_parse_from(["ferry", "extract", "a.mp4", "a.wav", "--deadline-ms", "soon"])
            .is_err()
    );
}

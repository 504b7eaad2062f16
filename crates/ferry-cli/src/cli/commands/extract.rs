//! `ferry extract` – race the configured strategies and deliver the winner.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use ferry_core::config::FerryConfig;
use ferry_core::extract::{
    CommandStrategy, Constraints, ExtractionRequest, SharedStrategy, SinkDescriptor, SourceRef,
    StrategyRacer,
};
use ferry_core::telemetry::{TelemetryHistory, TelemetryRecorder};

use super::HISTORY_PER_CATEGORY;

#[derive(Debug)]
pub struct ExtractOptions {
    pub source: String,
    pub sink: PathBuf,
    pub deadline_ms: Option<u64>,
    pub max_duration: Option<f64>,
    pub sample_rate: u32,
    pub channels: u16,
    pub category: Option<String>,
    pub learned_order: bool,
}

fn source_ref(source: &str) -> SourceRef {
    if source.contains("://") {
        SourceRef::Url(source.to_string())
    } else {
        SourceRef::Path(PathBuf::from(source))
    }
}

pub async fn run_extract(cfg: &FerryConfig, opts: ExtractOptions) -> Result<()> {
    let max_duration = opts
        .max_duration
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("invalid --max-duration")?;
    let mut request = ExtractionRequest::new(
        source_ref(&opts.source),
        SinkDescriptor::File(opts.sink.clone()),
        Constraints {
            max_duration,
            sample_rate: opts.sample_rate,
            channels: opts.channels,
        },
    );
    if let Some(category) = opts.category {
        request = request.with_category(category);
    }

    let history_path = TelemetryHistory::default_path().ok();
    let history = match history_path
        .as_deref()
        .map(|p| TelemetryHistory::load_from_path(p, HISTORY_PER_CATEGORY))
    {
        Some(Ok(Some(h))) => {
            tracing::debug!(records = h.total_records(), "loaded race telemetry");
            h
        }
        Some(Err(e)) => {
            tracing::warn!("ignoring unreadable telemetry: {:#}", e);
            TelemetryHistory::new(HISTORY_PER_CATEGORY)
        }
        _ => TelemetryHistory::new(HISTORY_PER_CATEGORY),
    };
    let (recorder, worker) =
        TelemetryRecorder::spawn_with_history(cfg.race.telemetry_capacity, history);

    let mut strategies: Vec<SharedStrategy> = cfg
        .strategies
        .iter()
        .map(|s| Arc::new(CommandStrategy::from_config(s)) as SharedStrategy)
        .collect();
    if strategies.is_empty() {
        tracing::warn!("no strategies configured; output will be the fallback placeholder");
    }
    if opts.learned_order {
        let names: Vec<String> = strategies.iter().map(|s| s.name().to_string()).collect();
        let order = recorder.preferred_order(request.category(), &names);
        strategies.sort_by_key(|s| order.iter().position(|n| n == s.name()));
        tracing::debug!(?order, "using learned strategy order");
    }

    let mut racer = StrategyRacer::from_config(cfg).with_telemetry(recorder);
    if let Some(ms) = opts.deadline_ms {
        racer = racer.with_deadline(Duration::from_millis(ms));
    }

    let result = racer.race_or_fallback(&request, &strategies).await?;
    result
        .artifact
        .output
        .deliver_to(&opts.sink)
        .with_context(|| format!("deliver to {}", opts.sink.display()))?;

    if result.is_fallback() {
        println!(
            "No strategy succeeded ({} attempted); wrote silent placeholder.",
            result.attempted.len()
        );
    }
    println!(
        "{}  {:.2}s audio  {} Hz x{}  in {} ms  -> {}",
        result.method(),
        result.artifact.duration.as_secs_f64(),
        result.artifact.sample_rate,
        result.artifact.channels,
        result.elapsed.as_millis(),
        opts.sink.display()
    );

    drop(racer);
    let history = worker.finish().await;
    if let Some(path) = history_path {
        if let Err(e) = history.save_to_path(&path) {
            tracing::warn!("could not save race telemetry: {:#}", e);
        }
    }
    Ok(())
}

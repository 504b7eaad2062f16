//! CLI for Ferry.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ferry_core::config;

use commands::{run_extract, run_stats, run_watch, ExtractOptions};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ferry")]
#[command(about = "Ferry: race extraction strategies and watch transfers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Race the configured extraction commands and write the winning audio to SINK.
    Extract {
        /// Input file path or URL.
        source: String,
        /// Output WAV path.
        sink: PathBuf,
        /// Override the race deadline from the config.
        #[arg(long, value_name = "MS")]
        deadline_ms: Option<u64>,
        /// Extract at most this many seconds.
        #[arg(long, value_name = "SECS")]
        max_duration: Option<f64>,
        #[arg(long, default_value = "16000", value_name = "HZ")]
        sample_rate: u32,
        #[arg(long, default_value = "1")]
        channels: u16,
        /// Telemetry category (default: source file extension).
        #[arg(long)]
        category: Option<String>,
        /// Register strategies in the order past races favoured, instead of config order.
        #[arg(long)]
        learned_order: bool,
    },

    /// Watch a file being written by another process and report speed and ETA.
    Watch {
        /// File to watch.
        path: PathBuf,
        /// Expected final size; the watch completes when it is reached.
        #[arg(long, value_name = "BYTES")]
        total: u64,
        /// Poll interval (default from config).
        #[arg(long, value_name = "MS")]
        interval_ms: Option<u64>,
    },

    /// Show recorded race telemetry.
    Stats {
        /// Only this category.
        #[arg(long)]
        category: Option<String>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
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
                let opts = ExtractOptions {
                    source,
                    sink,
                    deadline_ms,
                    max_duration,
                    sample_rate,
                    channels,
                    category,
                    learned_order,
                };
                run_extract(&cfg, opts).await?
            }
            CliCommand::Watch {
                path,
                total,
                interval_ms,
            } => run_watch(&cfg, &path, total, interval_ms).await?,
            CliCommand::Stats { category } => run_stats(category.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;

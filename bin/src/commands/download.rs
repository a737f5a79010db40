//! Download command implementation.
//!
//! Builds one job from the command line and configuration file, runs it in
//! the foreground, and cancels it cleanly on Ctrl-C. Re-running the same
//! command resumes from the last checkpoint.

use crate::config::Config;
use crate::display::ProgressBarReporter;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use ducat_lib::{
    CircuitBreaker, DataSource, DateRange, DownloadClient, FileCheckpointStore, JobKey,
    JobRequest, JobRunner, JobState, OutputFormat, PriceSide, Symbol, Timeframe,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Arguments of `ducat download`.
#[derive(Args)]
pub(crate) struct DownloadArgs {
    /// Instrument identifier (e.g., eurusd, btcusd)
    instrument: String,

    /// Start date (YYYY-MM-DD)
    #[arg(short, long)]
    start: String,

    /// End date (YYYY-MM-DD, inclusive). Defaults to the start date.
    #[arg(short, long)]
    end: Option<String>,

    /// Timeframe: tick, s1, m1, m5, m15, m30, h1, h4, d1 or a custom width such as 7h
    #[arg(short, long, default_value = "tick")]
    timeframe: String,

    /// Data source: ticks or native (pre-aggregated one-minute candles)
    #[arg(long, default_value = "ticks")]
    source: String,

    /// Quote side feeding candles: bid, ask or mid
    #[arg(long, default_value = "ask")]
    side: String,

    /// Output format (csv or ndjson). Overrides the config file.
    #[arg(short, long)]
    format: Option<String>,

    /// Output file path. Defaults to a name derived from the job.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Days fetched concurrently. Overrides the config file.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Ignore any checkpoint and start over
    #[arg(long)]
    fresh: bool,
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Invalid date: {s}"))
}

impl DownloadArgs {
    fn key(&self) -> Result<JobKey> {
        let start = parse_date(&self.start)?;
        let end = self.end.as_deref().map(parse_date).transpose()?.unwrap_or(start);

        Ok(JobKey {
            symbol: Symbol::new(&self.instrument)?,
            range: DateRange::new(start, end)?,
            timeframe: self.timeframe.parse::<Timeframe>()?,
            source: self
                .source
                .parse::<DataSource>()
                .map_err(|e| anyhow::anyhow!("{e}"))?,
            price_side: self
                .side
                .parse::<PriceSide>()
                .map_err(|e| anyhow::anyhow!("{e}"))?,
        })
    }

    /// Layers command-line flags over the configuration file.
    fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(format) = &self.format {
            config.job.format = format.parse::<OutputFormat>()?;
        }
        if let Some(workers) = self.workers {
            config.job.workers = workers;
        }
        if self.fresh {
            config.job.resume = false;
        }
        Ok(())
    }
}

/// Download one instrument over a date range.
pub(crate) async fn download(args: DownloadArgs, mut config: Config, quiet: bool) -> Result<()> {
    let key = args.key()?;
    args.apply(&mut config)?;

    let store = match &config.checkpoint_dir {
        Some(dir) => FileCheckpointStore::new(dir),
        None => FileCheckpointStore::with_default_path(),
    }
    .context("Failed to open checkpoint store")?;
    let client = DownloadClient::new(config.client.clone()).context("Failed to create HTTP client")?;
    let breaker = CircuitBreaker::new(config.breaker.clone());

    let mut request = JobRequest::new(key.clone()).with_config(config.job.clone());
    if let Some(output) = args.output {
        request = request.with_output(output);
    }

    let progress = Arc::new(ProgressBarReporter::new(
        key.range.total_days(),
        &format!("{} {}", key.symbol, key.range),
        quiet,
    )?);
    let runner = JobRunner::new(request, Arc::new(client), Arc::new(breaker), Arc::new(store))
        .with_observer(progress.clone());

    let cancel = runner.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, finishing in-flight days");
            cancel.cancel();
        }
    });

    let result = runner.run().await;
    let outcome = result.with_context(|| format!("Download of {key} failed"))?;

    let message = match outcome.state {
        JobState::Cancelled => "cancelled".to_string(),
        _ => format!("{} records written", outcome.records_written),
    };
    progress.finish(message);

    if !quiet {
        println!("Output written to: {}", outcome.output.display());
        if progress.warnings() > 0 {
            println!("{} data-integrity warnings (run with -v for details)", progress.warnings());
        }
        if !outcome.failed_days.is_empty() {
            println!("{} days failed and will be retried on the next run:", outcome.failed_days.len());
            for day in &outcome.failed_days {
                println!("  {day}");
            }
        }
        if outcome.state == JobState::Cancelled {
            println!("Cancelled. Run the same command again to resume.");
        }
    }

    Ok(())
}

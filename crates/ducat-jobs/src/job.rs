//! Job definitions and types.

use std::path::PathBuf;

use chrono::NaiveDate;
use ducat_format::OutputFormat;
use ducat_types::{DataSource, DateRange, DayUnit, PriceSide, Symbol, Timeframe};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::JobConfig;

/// Unique identifier for a job.
pub type JobId = Uuid;

/// State of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Job is queued but not yet started.
    #[default]
    Pending,
    /// Job is currently running.
    Running,
    /// Every day was processed.
    Completed,
    /// Job stopped on an abort condition.
    Failed,
    /// Job was cancelled by the user.
    Cancelled,
}

impl JobState {
    /// Returns true if the job is in a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns the state as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Identity of a job's work. Checkpoints are keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    /// Instrument.
    pub symbol: Symbol,
    /// Inclusive date range.
    pub range: DateRange,
    /// Output timeframe.
    pub timeframe: Timeframe,
    /// Data source.
    pub source: DataSource,
    /// Quote side feeding candles.
    pub price_side: PriceSide,
}

impl JobKey {
    /// Returns a file-name-safe stem identifying the job.
    #[must_use]
    pub fn stem(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            self.symbol.as_str().to_lowercase(),
            self.range.start,
            self.range.end,
            self.timeframe,
            self.source,
            self.price_side
        )
    }

    /// Returns the output file name for `format`.
    #[must_use]
    pub fn file_name(&self, format: OutputFormat) -> String {
        format!("{}.{}", self.stem(), format.extension())
    }

    /// Returns the day unit for `day`.
    #[must_use]
    pub fn unit(&self, day: NaiveDate) -> DayUnit {
        DayUnit::new(self.symbol.clone(), day, self.source)
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.symbol, self.range, self.timeframe, self.source, self.price_side
        )
    }
}

/// A job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// What to download.
    pub key: JobKey,
    /// Output file. Defaults to the key's file name inside the configured output directory.
    pub output: Option<PathBuf>,
    /// How to run it.
    pub config: JobConfig,
}

impl JobRequest {
    /// Creates a request with default settings.
    #[must_use]
    pub fn new(key: JobKey) -> Self {
        Self {
            key,
            output: None,
            config: JobConfig::default(),
        }
    }

    /// Sets the output file.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Sets the job configuration.
    #[must_use]
    pub fn with_config(mut self, config: JobConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the output path this request writes to.
    #[must_use]
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            self.config
                .output_dir
                .join(self.key.file_name(self.config.format))
        })
    }
}

/// Point-in-time progress of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusReport {
    /// Current state.
    pub state: JobState,
    /// Days processed, including non-trading days.
    pub completed_days: usize,
    /// Days whose download failed.
    pub failed_days: usize,
    /// Days in the range.
    pub total_days: usize,
}

impl JobStatusReport {
    /// Returns the progress percentage.
    #[must_use]
    pub fn progress_percent(&self) -> f64 {
        if self.total_days == 0 {
            return 0.0;
        }
        (self.completed_days + self.failed_days) as f64 / self.total_days as f64 * 100.0
    }
}

/// Result of a job that ran to a terminal state without an abort condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    /// Terminal state: completed or cancelled.
    pub state: JobState,
    /// Days processed, including non-trading days.
    pub completed_days: usize,
    /// Days that failed and remain eligible for resume.
    pub failed_days: Vec<NaiveDate>,
    /// Records written by this run.
    pub records_written: u64,
    /// Output file.
    pub output: PathBuf,
}

//! Job configuration.

use std::path::PathBuf;

use ducat_aggregate::ValidatorConfig;
use ducat_fetch::{DEFAULT_HOUR_CONCURRENCY, RetryConfig};
use ducat_format::OutputFormat;
use ducat_instruments::HolidayCalendar;
use ducat_types::DataSource;
use serde::{Deserialize, Serialize};

use crate::{JobError, JobKey};

/// How a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Days fetched concurrently.
    pub workers: usize,
    /// Hour files fetched concurrently within one day.
    pub hour_concurrency: usize,
    /// Days between checkpoint saves.
    pub checkpoint_every: usize,
    /// Fraction of the range that may fail consecutively before the job aborts.
    pub max_failure_fraction: f64,
    /// Output format.
    pub format: OutputFormat,
    /// Directory for output files without an explicit path.
    pub output_dir: PathBuf,
    /// Resume from an existing checkpoint instead of starting over.
    pub resume: bool,
    /// Per-file retry budget.
    pub retry: RetryConfig,
    /// Record validation.
    pub validator: ValidatorConfig,
    /// Extra market closures.
    pub calendar: HolidayCalendar,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            hour_concurrency: DEFAULT_HOUR_CONCURRENCY,
            checkpoint_every: 1,
            max_failure_fraction: 0.1,
            format: OutputFormat::Csv,
            output_dir: PathBuf::from("."),
            resume: true,
            retry: RetryConfig::default(),
            validator: ValidatorConfig::default(),
            calendar: HolidayCalendar::default(),
        }
    }
}

impl JobConfig {
    /// Parses a configuration from JSON, filling missing fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Returns how many consecutive failed days abort a job of `total_days`.
    ///
    /// Always at least one.
    #[must_use]
    pub fn failure_limit(&self, total_days: usize) -> usize {
        let limit = (self.max_failure_fraction * total_days as f64).ceil();
        if limit.is_finite() && limit >= 1.0 {
            limit as usize
        } else {
            1
        }
    }

    /// Checks that this configuration can run `key`.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self, key: &JobKey) -> Result<(), JobError> {
        if self.workers == 0 {
            return Err(JobError::InvalidConfig("workers must be at least 1".into()));
        }
        if self.checkpoint_every == 0 {
            return Err(JobError::InvalidConfig(
                "checkpoint_every must be at least 1".into(),
            ));
        }
        if !(self.max_failure_fraction > 0.0 && self.max_failure_fraction <= 1.0) {
            return Err(JobError::InvalidConfig(
                "max_failure_fraction must be in (0, 1]".into(),
            ));
        }
        if key.timeframe.seconds() == Some(0) {
            return Err(JobError::InvalidConfig(
                "timeframe width must be at least one second".into(),
            ));
        }
        if key.source == DataSource::Native {
            let whole_minutes = key.timeframe.seconds().is_some_and(|s| s % 60 == 0);
            if !whole_minutes {
                return Err(JobError::InvalidConfig(format!(
                    "native candles need a whole-minute timeframe, got {}",
                    key.timeframe
                )));
            }
        }
        Ok(())
    }
}

//! Display utilities for the ducat CLI.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use ducat_lib::{Annotated, DaySummary, FetchError, JobId, JobState, ProgressObserver, Record};
use ducat_lib::{Category, ValidationStatus};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

/// Drives an indicatif progress bar from job events.
pub(crate) struct ProgressBarReporter {
    bar: ProgressBar,
    records: AtomicU64,
    failed: AtomicU64,
    warnings: AtomicU64,
}

impl ProgressBarReporter {
    /// Creates a bar over `total_days`; hidden in quiet mode.
    pub(crate) fn new(total_days: usize, label: &str, quiet: bool) -> Result<Self> {
        let bar = if quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new(total_days as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} days ({percent}%) {msg}")?
                    .progress_chars("=>-"),
            );
            bar.set_message(label.to_string());
            bar
        };
        Ok(Self {
            bar,
            records: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            warnings: AtomicU64::new(0),
        })
    }

    /// Number of data-integrity warnings seen.
    pub(crate) fn warnings(&self) -> u64 {
        self.warnings.load(Ordering::Relaxed)
    }

    pub(crate) fn finish(&self, message: String) {
        self.bar.finish_with_message(message);
    }
}

impl ProgressObserver for ProgressBarReporter {
    fn on_state_change(&self, _job: JobId, state: JobState) {
        if state == JobState::Cancelled {
            self.bar.abandon_with_message("cancelled");
        }
    }

    fn on_day_complete(&self, _job: JobId, summary: &DaySummary) {
        let total = self
            .records
            .fetch_add(summary.records_written as u64, Ordering::Relaxed)
            + summary.records_written as u64;
        // Completed days include those restored from a checkpoint.
        let failed = self.failed.load(Ordering::Relaxed);
        self.bar.set_position(summary.completed_days as u64 + failed);
        self.bar.set_message(format!("{} ({total} records)", summary.day));
    }

    fn on_day_failed(&self, _job: JobId, day: NaiveDate, error: &FetchError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.bar.inc(1);
        self.bar.println(format!("  {day}: failed ({error})"));
    }

    fn on_diagnostic(&self, _job: JobId, record: &Annotated<Record>) {
        if matches!(
            record.status,
            ValidationStatus::Gap { .. } | ValidationStatus::Inconsistent
        ) {
            self.warnings.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Parse a category string into a Category enum.
pub(crate) fn parse_category(s: &str) -> Result<Category> {
    match s.to_lowercase().as_str() {
        "forex" => Ok(Category::Forex),
        "crypto" => Ok(Category::Crypto),
        "index" => Ok(Category::Index),
        "stock" => Ok(Category::Stock),
        "commodity" => Ok(Category::Commodity),
        "etf" => Ok(Category::Etf),
        "bond" => Ok(Category::Bond),
        _ => bail!(
            "Unknown category: {}. Valid options: forex, crypto, index, stock, commodity, etf, bond",
            s
        ),
    }
}

//! Record stream validation.
//!
//! The validator never rejects a stream. It tags each record with a
//! [`ValidationStatus`] and drops only the losing side of a duplicate
//! timestamp. To let "last wins" replace a record that has not been written
//! yet, one record is held back until its successor arrives; call
//! [`Validator::finish`] to release it.

use ducat_types::Record;
use serde::{Deserialize, Serialize};

/// Which of two records sharing a timestamp is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the record seen first.
    #[default]
    FirstWins,
    /// Keep the record seen last.
    LastWins,
}

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Extra time beyond the expected step before a gap is reported, in milliseconds.
    pub gap_threshold_ms: u64,
    /// Duplicate timestamp tie-break.
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            gap_threshold_ms: 3_600_000,
            duplicate_policy: DuplicatePolicy::FirstWins,
        }
    }
}

/// Outcome of validating one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Nothing to report.
    Ok,
    /// Time since the previous record exceeds the expected step plus threshold.
    Gap {
        /// Milliseconds since the previous record.
        delta_ms: i64,
    },
    /// Timestamp already seen, or older than one already seen. The record is dropped.
    Duplicate,
    /// OHLC invariant violated.
    Inconsistent,
}

/// A record together with its validation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Annotated<T> {
    /// The record.
    pub record: T,
    /// Its status.
    pub status: ValidationStatus,
}

impl<T> Annotated<T> {
    /// Returns true if the record should not be written.
    #[must_use]
    pub const fn is_dropped(&self) -> bool {
        matches!(self.status, ValidationStatus::Duplicate)
    }
}

/// Resumable validator state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorState {
    /// Timestamp of the last released record, in milliseconds.
    pub last_ts_ms: Option<i64>,
    /// Record held back awaiting its successor.
    pub pending: Option<Record>,
}

/// Annotates a time-ordered record stream.
#[derive(Debug, Clone)]
pub struct Validator {
    config: ValidatorConfig,
    expected_step_ms: i64,
    state: ValidatorState,
}

impl Validator {
    /// Creates a validator.
    ///
    /// `expected_step_ms` is the normal spacing between records: the candle
    /// width, or zero for ticks.
    #[must_use]
    pub fn new(config: ValidatorConfig, expected_step_ms: i64) -> Self {
        Self {
            config,
            expected_step_ms,
            state: ValidatorState::default(),
        }
    }

    /// Restores a validator from a saved state.
    #[must_use]
    pub const fn from_state(
        config: ValidatorConfig,
        expected_step_ms: i64,
        state: ValidatorState,
    ) -> Self {
        Self {
            config,
            expected_step_ms,
            state,
        }
    }

    /// Returns the current state for checkpointing.
    #[must_use]
    pub const fn state(&self) -> &ValidatorState {
        &self.state
    }

    /// Validates the next record.
    ///
    /// Returns the records released by this call, in stream order: at most
    /// one record ready for output and at most one dropped duplicate.
    pub fn validate(&mut self, record: Record) -> Vec<Annotated<Record>> {
        let ts = record.timestamp().timestamp_millis();

        let Some(pending) = self.state.pending else {
            if self.state.last_ts_ms.is_some_and(|last| ts <= last) {
                return vec![self.drop_record(record)];
            }
            self.state.pending = Some(record);
            return Vec::new();
        };

        let pending_ts = pending.timestamp().timestamp_millis();
        if ts < pending_ts {
            return vec![self.drop_record(record)];
        }
        if ts == pending_ts {
            return match self.config.duplicate_policy {
                DuplicatePolicy::FirstWins => vec![self.drop_record(record)],
                DuplicatePolicy::LastWins => {
                    self.state.pending = Some(record);
                    vec![self.drop_record(pending)]
                }
            };
        }

        self.state.pending = Some(record);
        vec![self.release(pending)]
    }

    /// Releases the held-back record at the end of the stream.
    pub fn finish(&mut self) -> Option<Annotated<Record>> {
        let pending = self.state.pending.take()?;
        Some(self.release(pending))
    }

    fn release(&mut self, record: Record) -> Annotated<Record> {
        let ts = record.timestamp().timestamp_millis();
        let status = if !record.is_consistent() {
            tracing::warn!(timestamp = %record.timestamp(), "inconsistent OHLC values");
            ValidationStatus::Inconsistent
        } else {
            match self.state.last_ts_ms {
                Some(last) if ts - last > self.gap_limit() => {
                    let delta_ms = ts - last;
                    tracing::warn!(timestamp = %record.timestamp(), delta_ms, "gap in data");
                    ValidationStatus::Gap { delta_ms }
                }
                _ => ValidationStatus::Ok,
            }
        };
        self.state.last_ts_ms = Some(ts);
        Annotated { record, status }
    }

    fn drop_record(&self, record: Record) -> Annotated<Record> {
        tracing::debug!(
            timestamp = %record.timestamp(),
            policy = ?self.config.duplicate_policy,
            "dropping duplicate record"
        );
        Annotated {
            record,
            status: ValidationStatus::Duplicate,
        }
    }

    fn gap_limit(&self) -> i64 {
        let threshold = i64::try_from(self.config.gap_threshold_ms).unwrap_or(i64::MAX);
        self.expected_step_ms.saturating_add(threshold)
    }
}

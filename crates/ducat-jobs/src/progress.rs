//! Progress reporting.
//!
//! The runner reports to any number of [`ProgressObserver`]s. Every method has
//! a no-op default so an observer implements only what it cares about.

use chrono::{DateTime, NaiveDate, Utc};
use ducat_aggregate::{Annotated, ValidationStatus};
use ducat_fetch::FetchError;
use ducat_types::Record;
use tokio::sync::broadcast;

use crate::{JobId, JobState};

/// What happened to one day in the reduce stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySummary {
    /// The day.
    pub day: NaiveDate,
    /// True if the day was skipped as non-trading.
    pub holiday: bool,
    /// Records written while reducing this day.
    pub records_written: usize,
    /// Files skipped as undecodable.
    pub corrupt_files: u32,
    /// Days finished so far, including this one.
    pub completed_days: usize,
    /// Days in the job.
    pub total_days: usize,
}

/// Receives job progress.
pub trait ProgressObserver: Send + Sync {
    /// Called when the job changes state.
    fn on_state_change(&self, _job: JobId, _state: JobState) {}

    /// Called after a day has been written.
    fn on_day_complete(&self, _job: JobId, _summary: &DaySummary) {}

    /// Called when a day could not be downloaded.
    fn on_day_failed(&self, _job: JobId, _day: NaiveDate, _error: &FetchError) {}

    /// Called for every record whose validation status is not ok.
    fn on_diagnostic(&self, _job: JobId, _record: &Annotated<Record>) {}
}

/// Ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ProgressObserver for NullReporter {}

/// Logs progress through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ProgressObserver for ConsoleReporter {
    fn on_state_change(&self, job: JobId, state: JobState) {
        tracing::info!(%job, %state, "job state changed");
    }

    fn on_day_complete(&self, job: JobId, summary: &DaySummary) {
        tracing::info!(
            %job,
            day = %summary.day,
            holiday = summary.holiday,
            records = summary.records_written,
            progress = format_args!("{}/{}", summary.completed_days, summary.total_days),
            "day complete"
        );
    }

    fn on_day_failed(&self, job: JobId, day: NaiveDate, error: &FetchError) {
        tracing::warn!(%job, %day, %error, "day failed");
    }

    fn on_diagnostic(&self, job: JobId, record: &Annotated<Record>) {
        tracing::debug!(
            %job,
            timestamp = %record.record.timestamp(),
            status = ?record.status,
            "validation"
        );
    }
}

/// A progress event as delivered by [`ChannelReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The job changed state.
    StateChanged {
        /// Job.
        job: JobId,
        /// New state.
        state: JobState,
    },
    /// A day was written.
    DayCompleted {
        /// Job.
        job: JobId,
        /// What was written.
        summary: DaySummary,
    },
    /// A day could not be downloaded.
    DayFailed {
        /// Job.
        job: JobId,
        /// The day.
        day: NaiveDate,
        /// Why.
        error: FetchError,
    },
    /// A record was flagged.
    Diagnostic {
        /// Job.
        job: JobId,
        /// Record timestamp.
        timestamp: DateTime<Utc>,
        /// Validation status.
        status: ValidationStatus,
    },
}

/// Pushes events to subscribers over a broadcast channel.
///
/// Slow subscribers miss events rather than stall the job.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: broadcast::Sender<ProgressEvent>,
}

impl ChannelReporter {
    /// Creates a reporter buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Returns a new event receiver.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    fn send(&self, event: ProgressEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

impl ProgressObserver for ChannelReporter {
    fn on_state_change(&self, job: JobId, state: JobState) {
        self.send(ProgressEvent::StateChanged { job, state });
    }

    fn on_day_complete(&self, job: JobId, summary: &DaySummary) {
        self.send(ProgressEvent::DayCompleted {
            job,
            summary: *summary,
        });
    }

    fn on_day_failed(&self, job: JobId, day: NaiveDate, error: &FetchError) {
        self.send(ProgressEvent::DayFailed {
            job,
            day,
            error: error.clone(),
        });
    }

    fn on_diagnostic(&self, job: JobId, record: &Annotated<Record>) {
        self.send(ProgressEvent::Diagnostic {
            job,
            timestamp: record.record.timestamp(),
            status: record.status,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn summary() -> DaySummary {
        DaySummary {
            day: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            holiday: false,
            records_written: 10,
            corrupt_files: 0,
            completed_days: 1,
            total_days: 3,
        }
    }

    #[tokio::test]
    async fn test_channel_reporter_delivers_events() {
        let reporter = ChannelReporter::new(16);
        let mut rx = reporter.subscribe();
        let job = Uuid::new_v4();

        reporter.on_state_change(job, JobState::Running);
        reporter.on_day_complete(job, &summary());
        reporter.on_day_failed(job, summary().day, &FetchError::Cancelled);

        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::StateChanged {
                job,
                state: JobState::Running
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            ProgressEvent::DayCompleted {
                job,
                summary: summary()
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            ProgressEvent::DayFailed { error: FetchError::Cancelled, .. }
        ));
    }

    #[test]
    fn test_channel_reporter_without_subscribers() {
        let reporter = ChannelReporter::new(1);
        reporter.on_state_change(Uuid::new_v4(), JobState::Completed);
    }

    #[test]
    fn test_default_methods_are_no_ops() {
        let observers: Vec<Box<dyn ProgressObserver>> =
            vec![Box::new(NullReporter), Box::new(ConsoleReporter)];
        for observer in observers {
            observer.on_state_change(Uuid::new_v4(), JobState::Pending);
            observer.on_day_complete(Uuid::new_v4(), &summary());
        }
    }
}

//! Runs one job: parallel day fetches feeding a sequential, ordered reduce.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use ducat_aggregate::{Aggregator, Annotated, CarryState, ValidationStatus, Validator};
use ducat_fetch::{CircuitBreaker, DayData, DayFetcher, FetchError, Transport};
use ducat_format::{FileSink, FormatError, OutputSink};
use ducat_instruments::InstrumentRegistry;
use ducat_types::{CancelFlag, Record, RecordKind, day_start};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;
use uuid::Uuid;

use crate::reorder::ReorderBuffer;
use crate::{
    Checkpoint, CheckpointStore, DaySummary, Frontier, JobConfig, JobError, JobId, JobKey,
    JobOutcome, JobRequest, JobState, JobStatusReport, ProgressObserver,
};

fn next_day(day: NaiveDate) -> NaiveDate {
    day.succ_opt().unwrap_or(NaiveDate::MAX)
}

/// Runs a single job to a terminal state.
///
/// Up to `workers` days are fetched at once. Results are reduced strictly in
/// day order by one stage that aggregates, validates, writes and
/// checkpoints, so no state is shared between workers except the circuit
/// breaker.
pub struct JobRunner {
    id: JobId,
    key: JobKey,
    config: JobConfig,
    output: PathBuf,
    fetcher: DayFetcher,
    store: Arc<dyn CheckpointStore>,
    observers: Vec<Arc<dyn ProgressObserver>>,
    cancel: CancelFlag,
    status: watch::Sender<JobStatusReport>,
}

impl std::fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRunner")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl JobRunner {
    /// Creates a runner for `request`.
    ///
    /// The instrument is resolved from the global registry; unknown symbols
    /// fall back to default forex precision.
    #[must_use]
    pub fn new(
        request: JobRequest,
        transport: Arc<dyn Transport>,
        breaker: Arc<CircuitBreaker>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        let output = request.output_path();
        let JobRequest { key, config, .. } = request;
        let instrument = InstrumentRegistry::global().resolve(&key.symbol);
        let fetcher = DayFetcher::new(transport, breaker, instrument)
            .with_calendar(config.calendar.clone())
            .with_retry(config.retry.clone())
            .with_hour_concurrency(config.hour_concurrency)
            .with_price_side(key.price_side);
        let (status, _) = watch::channel(JobStatusReport {
            total_days: key.range.total_days(),
            ..JobStatusReport::default()
        });

        Self {
            id: Uuid::new_v4(),
            key,
            config,
            output,
            fetcher,
            store,
            observers: Vec::new(),
            cancel: CancelFlag::new(),
            status,
        }
    }

    /// Sets the job id.
    #[must_use]
    pub const fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    /// Attaches a progress observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Uses an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the job id.
    #[must_use]
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Returns the output file.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Returns the flag that cancels this job.
    #[must_use]
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Returns a live view of the job's progress.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<JobStatusReport> {
        self.status.subscribe()
    }

    /// Runs the job.
    ///
    /// Failed days do not fail the job; they are reported in the outcome and
    /// left for a later resume. Cancellation ends the job in
    /// [`JobState::Cancelled`] with completed days checkpointed.
    ///
    /// # Errors
    ///
    /// Returns a [`JobError`] for abort conditions: invalid configuration, a
    /// corrupt checkpoint, too many consecutive failed days, or an output or
    /// checkpoint write failure.
    pub async fn run(self) -> Result<JobOutcome, JobError> {
        let result = self.execute().await;
        match &result {
            Ok(outcome) => self.set_state(outcome.state),
            Err(error) => {
                tracing::error!(job = %self.id, %error, "job failed");
                self.set_state(JobState::Failed);
            }
        }
        result
    }

    async fn execute(&self) -> Result<JobOutcome, JobError> {
        self.config.validate(&self.key)?;
        self.set_state(JobState::Running);

        let loaded = if self.config.resume {
            self.store.load(&self.key)?
        } else {
            self.store.clear(&self.key)?;
            None
        };
        let resuming = loaded.is_some();
        let mut checkpoint = loaded.unwrap_or_else(|| Checkpoint::new(self.key.clone()));

        if checkpoint.finished {
            tracing::info!(job = %self.id, key = %self.key, "job already finished");
            self.status
                .send_modify(|s| s.completed_days = checkpoint.completed_days.len());
            return Ok(JobOutcome {
                state: JobState::Completed,
                completed_days: checkpoint.completed_days.len(),
                failed_days: Vec::new(),
                records_written: 0,
                output: self.output.clone(),
            });
        }

        // Everything from the frontier on is redone.
        let frontier = checkpoint.frontier.clone();
        checkpoint
            .completed_days
            .retain(|day| *day < frontier.next_day);
        checkpoint.failed_days.clear();
        self.status.send_modify(|s| {
            s.completed_days = checkpoint.completed_days.len();
            s.failed_days = 0;
        });

        let kind = if self.key.timeframe.is_tick() {
            RecordKind::Tick
        } else {
            RecordKind::Candle
        };
        let sink = self.open_sink(resuming, frontier.committed_bytes, kind)?;
        let pending: Vec<NaiveDate> = self
            .key
            .range
            .days()
            .filter(|day| *day >= frontier.next_day)
            .collect();

        tracing::info!(
            job = %self.id,
            key = %self.key,
            output = %self.output.display(),
            resume_from = %frontier.next_day,
            pending = pending.len(),
            "starting job"
        );

        let step_ms = self.key.timeframe.milliseconds().unwrap_or(0);
        let mut reducer = Reducer {
            runner: self,
            aggregator: Aggregator::new(
                self.key.timeframe,
                self.key.price_side,
                self.fetcher.instrument().price_scale(),
            ),
            validator: Validator::from_state(
                self.config.validator.clone(),
                step_ms,
                frontier.validator.clone(),
            ),
            carry: frontier.carry.clone(),
            sink,
            checkpoint,
            frozen: false,
            since_save: 0,
            consecutive_failures: 0,
            failure_limit: self.config.failure_limit(self.key.range.total_days()),
            records_written: 0,
        };

        let reduced = self.drive(&pending, &mut reducer).await?;
        match pending.get(reduced) {
            Some(day) => reducer.cancel(*day),
            None => reducer.complete(),
        }
    }

    /// Fetches `pending` in parallel and reduces results in order.
    ///
    /// Returns how many days were reduced; fewer than `pending.len()` means
    /// the job was cancelled.
    async fn drive(&self, pending: &[NaiveDate], reducer: &mut Reducer<'_>) -> Result<usize, JobError> {
        let workers = self.config.workers.max(1);
        let lookahead = workers * 2;
        let fetcher = &self.fetcher;
        let cancel = &self.cancel;

        let mut in_flight = FuturesUnordered::new();
        let mut buffer = ReorderBuffer::new();
        let mut scheduled = 0;
        let mut reduced = 0;
        let mut halted = false;

        loop {
            while !halted
                && !cancel.is_cancelled()
                && scheduled < pending.len()
                && in_flight.len() < workers
                && scheduled < buffer.next_index() + lookahead
            {
                let index = scheduled;
                let unit = self.key.unit(pending[index]);
                in_flight.push(async move { (index, fetcher.fetch(&unit, cancel).await) });
                scheduled += 1;
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };
            if halted {
                continue;
            }
            buffer.insert(index, result);
            tracing::trace!(held = buffer.held(), next = buffer.next_index(), "reorder buffer");

            while let Some((index, result)) = buffer.pop_ready() {
                match result {
                    Ok(data) => reducer.complete_day(data)?,
                    Err(FetchError::Cancelled) => {
                        halted = true;
                        break;
                    }
                    Err(error) => reducer.fail_day(pending[index], error)?,
                }
                reduced += 1;
                if cancel.is_cancelled() {
                    halted = true;
                    break;
                }
            }
        }

        Ok(reduced)
    }

    fn open_sink(
        &self,
        resuming: bool,
        committed: u64,
        kind: RecordKind,
    ) -> Result<FileSink, JobError> {
        if !resuming {
            return Ok(FileSink::create(&self.output, self.config.format, kind)?);
        }
        FileSink::resume(&self.output, self.config.format, kind, committed).map_err(|e| match e {
            e @ FormatError::Truncated { .. } => JobError::CheckpointCorrupt(e.to_string()),
            FormatError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                JobError::CheckpointCorrupt(format!(
                    "output '{}' is missing",
                    self.output.display()
                ))
            }
            other => JobError::Output(other),
        })
    }

    fn set_state(&self, state: JobState) {
        self.status.send_modify(|s| s.state = state);
        for observer in &self.observers {
            observer.on_state_change(self.id, state);
        }
    }
}

/// The sequential half of a job. Owns all mutable pipeline state.
struct Reducer<'a> {
    runner: &'a JobRunner,
    aggregator: Aggregator,
    validator: Validator,
    carry: CarryState,
    sink: FileSink,
    checkpoint: Checkpoint,
    /// Set after the first failed day; the frontier no longer advances.
    frozen: bool,
    since_save: usize,
    consecutive_failures: usize,
    failure_limit: usize,
    records_written: u64,
}

impl Reducer<'_> {
    fn complete_day(&mut self, data: DayData) -> Result<(), JobError> {
        let day = data.day;
        let written = self.advance(day, &data.records)?;

        self.checkpoint.completed_days.insert(day);
        self.consecutive_failures = 0;
        self.since_save += 1;
        if self.since_save >= self.runner.config.checkpoint_every {
            self.checkpoint_at(next_day(day))?;
        }

        let summary = DaySummary {
            day,
            holiday: data.holiday,
            records_written: written,
            corrupt_files: data.corrupt_files,
            completed_days: self.checkpoint.completed_days.len(),
            total_days: self.runner.key.range.total_days(),
        };
        self.runner
            .status
            .send_modify(|s| s.completed_days = summary.completed_days);
        for observer in &self.runner.observers {
            observer.on_day_complete(self.runner.id, &summary);
        }
        Ok(())
    }

    fn fail_day(&mut self, day: NaiveDate, error: FetchError) -> Result<(), JobError> {
        tracing::warn!(job = %self.runner.id, %day, %error, "day failed, continuing");
        for observer in &self.runner.observers {
            observer.on_day_failed(self.runner.id, day, &error);
        }

        if !self.frozen {
            self.checkpoint_at(day)?;
            self.frozen = true;
        }
        // A failed day contributes no records but still closes the day.
        self.advance(day, &[])?;
        self.checkpoint.failed_days.insert(day);
        self.save()?;

        self.runner
            .status
            .send_modify(|s| s.failed_days = self.checkpoint.failed_days.len());

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_limit {
            return Err(JobError::TooManyFailures {
                consecutive: self.consecutive_failures,
                limit: self.failure_limit,
                last: error,
            });
        }
        Ok(())
    }

    /// Aggregates one day and writes whatever it closes.
    fn advance(&mut self, day: NaiveDate, records: &[Record]) -> Result<usize, JobError> {
        let carry = std::mem::take(&mut self.carry);
        let (mut out, carry) = self.aggregator.aggregate(records, carry);
        let (sealed, carry) = self.aggregator.seal(carry, day_start(next_day(day)));
        out.extend(sealed.map(Record::Candle));
        self.carry = carry;

        let mut written = 0;
        for record in out {
            for annotated in self.validator.validate(record) {
                written += self.emit(&annotated)?;
            }
        }
        Ok(written)
    }

    fn emit(&mut self, annotated: &Annotated<Record>) -> Result<usize, JobError> {
        if annotated.status != ValidationStatus::Ok {
            for observer in &self.runner.observers {
                observer.on_diagnostic(self.runner.id, annotated);
            }
        }
        if annotated.is_dropped() {
            return Ok(0);
        }
        self.sink.write(&annotated.record)?;
        self.records_written += 1;
        Ok(1)
    }

    /// Flushes output and, unless frozen, moves the frontier to `next`.
    fn checkpoint_at(&mut self, next: NaiveDate) -> Result<(), JobError> {
        let committed = self.sink.flush()?;
        if !self.frozen {
            self.checkpoint.frontier = Frontier {
                next_day: next,
                carry: self.carry.clone(),
                validator: self.validator.state().clone(),
                committed_bytes: committed,
            };
        }
        self.since_save = 0;
        self.save()
    }

    fn save(&mut self) -> Result<(), JobError> {
        self.checkpoint.updated_at = Utc::now();
        self.runner.store.save(&self.checkpoint)?;
        Ok(())
    }

    /// Closes the last candle, flushes and records the final checkpoint.
    fn complete(mut self) -> Result<JobOutcome, JobError> {
        if let Some(candle) = self.aggregator.finish(std::mem::take(&mut self.carry)) {
            for annotated in self.validator.validate(Record::Candle(candle)) {
                self.emit(&annotated)?;
            }
        }
        if let Some(annotated) = self.validator.finish() {
            self.emit(&annotated)?;
        }

        self.checkpoint_at(next_day(self.runner.key.range.end))?;
        self.checkpoint.finished = !self.frozen;
        self.save()?;

        tracing::info!(
            job = %self.runner.id,
            records = self.records_written,
            failed_days = self.checkpoint.failed_days.len(),
            "job complete"
        );
        Ok(self.outcome(JobState::Completed))
    }

    /// Records progress up to `next` and stops.
    fn cancel(mut self, next: NaiveDate) -> Result<JobOutcome, JobError> {
        self.checkpoint_at(next)?;
        tracing::info!(job = %self.runner.id, resume_from = %self.checkpoint.frontier.next_day, "job cancelled");
        Ok(self.outcome(JobState::Cancelled))
    }

    fn outcome(self, state: JobState) -> JobOutcome {
        JobOutcome {
            state,
            completed_days: self.checkpoint.completed_days.len(),
            failed_days: self.checkpoint.failed_days.into_iter().collect(),
            records_written: self.records_written,
            output: self.runner.output.clone(),
        }
    }
}

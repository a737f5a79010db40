//! End-to-end job runs against a scripted feed.

use std::collections::{HashMap, HashSet};
use std::io::BufReader;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use chrono::{Datelike, NaiveDate};
use ducat_aggregate::ValidationStatus;
use ducat_fetch::{AttemptError, CircuitBreaker, RetryConfig, Transport, url::tick_url};
use ducat_jobs::{
    ChannelReporter, CheckpointStore, FileCheckpointStore, JobConfig, JobError, JobKey,
    JobOutcome, JobRequest, JobRunner, JobState, MemoryCheckpointStore, ProgressEvent,
};
use ducat_types::{CancelFlag, DataSource, DateRange, PriceSide, Symbol, Timeframe, hours_of};
use tempfile::TempDir;
use tokio::sync::Notify;

const BASE: &str = "http://feed.test/datafeed";
const TRADING_HOURS: [usize; 4] = [1, 8, 15, 23];

#[derive(Default)]
struct Feed {
    bodies: HashMap<String, Bytes>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    cancel_on: Option<(String, CancelFlag)>,
    stall_on: Option<(String, Arc<Notify>)>,
    requested: Mutex<Vec<String>>,
}

impl Feed {
    fn market(days: &[NaiveDate]) -> Self {
        let mut bodies = HashMap::new();
        for &day in days {
            for hour in TRADING_HOURS {
                let ask = 110_000 + day.ordinal() * 10 + hour as u32 * 3;
                let body = tick_body(&[(1_000, ask, ask - 5), (1_800_000, ask + 4, ask - 2)]);
                bodies.insert(hour_url(day, hour), body);
            }
        }
        Self {
            bodies,
            ..Self::default()
        }
    }

    fn fail_day(mut self, day: NaiveDate) -> Self {
        self.failing.insert(hour_url(day, 0));
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for Feed {
    fn base_url(&self) -> &str {
        BASE
    }

    async fn get(&self, url: &str) -> Result<Option<Bytes>, AttemptError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some((trigger, flag)) = &self.cancel_on {
            if trigger == url {
                flag.cancel();
            }
        }
        if let Some((trigger, stalled)) = &self.stall_on {
            if trigger == url {
                stalled.notify_one();
                std::future::pending::<()>().await;
            }
        }
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(url) {
            return Err(AttemptError::Client { status: 400 });
        }
        Ok(self.bodies.get(url).cloned())
    }
}

fn tick_body(ticks: &[(u32, u32, u32)]) -> Bytes {
    let mut raw = Vec::new();
    for &(ms, ask, bid) in ticks {
        let mut rec = [0u8; 20];
        BigEndian::write_u32(&mut rec[0..4], ms);
        BigEndian::write_u32(&mut rec[4..8], ask);
        BigEndian::write_u32(&mut rec[8..12], bid);
        BigEndian::write_f32(&mut rec[12..16], 1.5);
        BigEndian::write_f32(&mut rec[16..20], 2.5);
        raw.extend_from_slice(&rec);
    }
    let mut out = Vec::new();
    lzma_rs::lzma_compress(&mut BufReader::new(raw.as_slice()), &mut out).unwrap();
    Bytes::from(out)
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn hour_url(day: NaiveDate, hour: usize) -> String {
    tick_url(
        BASE,
        &Symbol::new("EURUSD").unwrap(),
        hours_of(day).nth(hour).unwrap(),
    )
}

fn key(start: NaiveDate, end: NaiveDate, timeframe: Timeframe) -> JobKey {
    JobKey {
        symbol: Symbol::new("EURUSD").unwrap(),
        range: DateRange::new(start, end).unwrap(),
        timeframe,
        source: DataSource::Ticks,
        price_side: PriceSide::Mid,
    }
}

fn config(dir: &Path, workers: usize) -> JobConfig {
    JobConfig {
        workers,
        output_dir: dir.to_path_buf(),
        max_failure_fraction: 0.5,
        retry: RetryConfig {
            max_attempts: 1,
            base_delay_ms: 1,
            max_delay_ms: 1,
            jitter: 0.0,
            max_cooldown_waits: 0,
            probe_poll_ms: 1,
            ..RetryConfig::default()
        },
        ..JobConfig::default()
    }
}

fn runner(feed: &Arc<Feed>, request: JobRequest, store: &Arc<dyn CheckpointStore>) -> JobRunner {
    JobRunner::new(
        request,
        feed.clone(),
        Arc::new(CircuitBreaker::default()),
        Arc::clone(store),
    )
}

fn memory_store() -> Arc<dyn CheckpointStore> {
    Arc::new(MemoryCheckpointStore::new())
}

/// Days 2024-01-02 (Tue) to 2024-01-05 (Fri).
fn week() -> (NaiveDate, NaiveDate, Vec<NaiveDate>) {
    let start = date(2024, 1, 2);
    let end = date(2024, 1, 5);
    (start, end, DateRange::new(start, end).unwrap().days().collect())
}

async fn reference_output(timeframe: Timeframe) -> String {
    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let feed = Arc::new(Feed::market(&days));
    let request =
        JobRequest::new(key(start, end, timeframe)).with_config(config(dir.path(), 1));
    let outcome = runner(&feed, request, &memory_store()).run().await.unwrap();
    assert_eq!(outcome.state, JobState::Completed);
    std::fs::read_to_string(outcome.output).unwrap()
}

#[tokio::test]
async fn test_uninterrupted_run_writes_ordered_candles() {
    let output = reference_output(Timeframe::Custom(7 * 3_600)).await;
    let mut lines = output.lines();
    assert_eq!(lines.next(), Some("timestamp,open,high,low,close,volume"));

    let timestamps: Vec<&str> = lines.map(|l| l.split(',').next().unwrap()).collect();
    assert!(!timestamps.is_empty());
    let mut sorted = timestamps.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted, timestamps);
    // Seven-hour buckets straddle midnight.
    assert!(timestamps.contains(&"2024-01-02T20:00:00Z"));
}

#[tokio::test]
async fn test_out_of_order_completion_keeps_output_identical() {
    let expected = reference_output(Timeframe::Hour1).await;

    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let mut feed = Feed::market(&days);
    feed.delays
        .insert(hour_url(start, 1), Duration::from_millis(80));
    let feed = Arc::new(feed);
    let request =
        JobRequest::new(key(start, end, Timeframe::Hour1)).with_config(config(dir.path(), 4));

    let outcome = runner(&feed, request, &memory_store()).run().await.unwrap();
    assert_eq!(std::fs::read_to_string(outcome.output).unwrap(), expected);
}

#[tokio::test]
async fn test_failed_day_resumes_to_identical_output() {
    let timeframe = Timeframe::Custom(7 * 3_600);
    let expected = reference_output(timeframe).await;

    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let store = memory_store();
    let job = key(start, end, timeframe);

    let feed = Arc::new(Feed::market(&days).fail_day(date(2024, 1, 3)));
    let request = JobRequest::new(job.clone()).with_config(config(dir.path(), 2));
    let first = runner(&feed, request.clone(), &store).run().await.unwrap();
    assert_eq!(first.state, JobState::Completed);
    assert_eq!(first.failed_days, vec![date(2024, 1, 3)]);
    assert_eq!(first.completed_days, 3);

    let checkpoint = store.load(&job).unwrap().unwrap();
    assert!(!checkpoint.finished);
    assert_eq!(checkpoint.frontier.next_day, date(2024, 1, 3));

    let feed = Arc::new(Feed::market(&days));
    let second = runner(&feed, request, &store).run().await.unwrap();
    assert_eq!(second.state, JobState::Completed);
    assert!(second.failed_days.is_empty());
    assert_eq!(second.completed_days, 4);
    assert!(
        feed.requested()
            .iter()
            .all(|url| !url.contains("/2024/00/02/"))
    );
    assert_eq!(std::fs::read_to_string(second.output).unwrap(), expected);
    assert!(store.load(&job).unwrap().unwrap().finished);
}

#[tokio::test]
async fn test_cancelled_job_resumes_to_identical_output() {
    let expected = reference_output(Timeframe::Hour4).await;

    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let store = memory_store();
    let request =
        JobRequest::new(key(start, end, Timeframe::Hour4)).with_config(config(dir.path(), 1));

    let cancel = CancelFlag::new();
    let mut feed = Feed::market(&days);
    feed.cancel_on = Some((hour_url(date(2024, 1, 3), 0), cancel.clone()));
    let feed = Arc::new(feed);
    let first = runner(&feed, request.clone(), &store)
        .with_cancel(cancel)
        .run()
        .await
        .unwrap();
    assert_eq!(first.state, JobState::Cancelled);
    assert_eq!(first.completed_days, 1);

    let feed = Arc::new(Feed::market(&days));
    let second: JobOutcome = runner(&feed, request, &store).run().await.unwrap();
    assert_eq!(second.state, JobState::Completed);
    assert_eq!(std::fs::read_to_string(second.output).unwrap(), expected);
}

/// Kills a job while it waits on 2024-01-05, leaving 2024-01-04 written
/// but not checkpointed, then resumes it.
async fn assert_crash_resumes_to_identical_output(timeframe: Timeframe) {
    let expected = reference_output(timeframe).await;

    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let store = memory_store();
    let job = key(start, end, timeframe);
    let request = JobRequest::new(job.clone()).with_config(JobConfig {
        checkpoint_every: 2,
        ..config(dir.path(), 1)
    });

    let stalled = Arc::new(Notify::new());
    let mut feed = Feed::market(&days);
    feed.stall_on = Some((hour_url(date(2024, 1, 5), 0), stalled.clone()));
    let feed = Arc::new(feed);
    let first = runner(&feed, request.clone(), &store);
    let output = first.output().to_path_buf();
    tokio::select! {
        outcome = first.run() => panic!("job ended before stalling: {outcome:?}"),
        () = stalled.notified() => {}
    }

    let checkpoint = store.load(&job).unwrap().unwrap();
    assert!(!checkpoint.finished);
    assert_eq!(checkpoint.frontier.next_day, date(2024, 1, 4));
    assert_eq!(checkpoint.completed_days.len(), 2);
    let on_disk = std::fs::metadata(&output).unwrap().len();
    assert!(on_disk > checkpoint.frontier.committed_bytes);

    let feed = Arc::new(Feed::market(&days));
    let second = runner(&feed, request, &store).run().await.unwrap();
    assert_eq!(second.state, JobState::Completed);
    assert_eq!(second.completed_days, 4);
    for done in ["/2024/00/02/", "/2024/00/03/"] {
        assert!(feed.requested().iter().all(|url| !url.contains(done)), "{done} refetched");
    }
    assert_eq!(std::fs::read_to_string(second.output).unwrap(), expected);
    assert!(store.load(&job).unwrap().unwrap().finished);
}

#[tokio::test]
async fn test_crash_between_checkpoints_resumes_candles() {
    assert_crash_resumes_to_identical_output(Timeframe::Custom(7 * 3_600)).await;
}

#[tokio::test]
async fn test_crash_between_checkpoints_resumes_ticks() {
    assert_crash_resumes_to_identical_output(Timeframe::Tick).await;
}

#[tokio::test]
async fn test_non_trading_days_are_not_fetched() {
    // Monday New Year's Day through Sunday.
    let start = date(2024, 1, 1);
    let end = date(2024, 1, 7);
    let dir = TempDir::new().unwrap();
    let days: Vec<NaiveDate> = DateRange::new(start, end).unwrap().days().collect();
    let feed = Arc::new(Feed::market(&days));
    let request =
        JobRequest::new(key(start, end, Timeframe::Hour1)).with_config(config(dir.path(), 3));

    let outcome = runner(&feed, request, &memory_store()).run().await.unwrap();
    assert_eq!(outcome.completed_days, 7);

    let requested = feed.requested();
    assert!(!requested.is_empty());
    for closed in ["/2024/00/01/", "/2024/00/06/"] {
        assert!(requested.iter().all(|url| !url.contains(closed)), "{closed} fetched");
    }
    // Forex trades on Sunday.
    assert!(requested.iter().any(|url| url.contains("/2024/00/07/")));
}

#[tokio::test]
async fn test_consecutive_failures_abort_the_job() {
    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let store = memory_store();
    let job = key(start, end, Timeframe::Hour1);

    let mut feed = Feed::market(&days);
    for &day in &days {
        feed = feed.fail_day(day);
    }
    let feed = Arc::new(feed);
    let request = JobRequest::new(job.clone()).with_config(JobConfig {
        max_failure_fraction: 0.25,
        ..config(dir.path(), 1)
    });

    let runner = runner(&feed, request, &store);
    let status = runner.status();
    let result = runner.run().await;
    assert!(matches!(
        result,
        Err(JobError::TooManyFailures {
            consecutive: 1,
            limit: 1,
            ..
        })
    ));
    assert_eq!(status.borrow().state, JobState::Failed);

    let checkpoint = store.load(&job).unwrap().unwrap();
    assert!(checkpoint.failed_days.contains(&start));
    assert_eq!(checkpoint.frontier.next_day, start);
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_reported() {
    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let store = FileCheckpointStore::new(dir.path().join("checkpoints")).unwrap();
    let job = key(start, end, Timeframe::Hour1);
    std::fs::write(store.path_for(&job), "{ not json").unwrap();

    let store: Arc<dyn CheckpointStore> = Arc::new(store);
    let feed = Arc::new(Feed::market(&days));
    let request = JobRequest::new(job).with_config(config(dir.path(), 1));

    let result = runner(&feed, request, &store).run().await;
    assert!(matches!(result, Err(JobError::CheckpointCorrupt(_))));
    assert!(feed.requested().is_empty());
}

#[tokio::test]
async fn test_missing_output_on_resume_is_corrupt() {
    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let store = memory_store();
    let request =
        JobRequest::new(key(start, end, Timeframe::Hour1)).with_config(config(dir.path(), 1));

    let feed = Arc::new(Feed::market(&days).fail_day(date(2024, 1, 4)));
    let first = runner(&feed, request.clone(), &store).run().await.unwrap();
    std::fs::remove_file(&first.output).unwrap();

    let feed = Arc::new(Feed::market(&days));
    let result = runner(&feed, request, &store).run().await;
    assert!(matches!(result, Err(JobError::CheckpointCorrupt(_))));
}

#[tokio::test]
async fn test_finished_job_does_no_work() {
    let (start, end, days) = week();
    let dir = TempDir::new().unwrap();
    let store: Arc<dyn CheckpointStore> =
        Arc::new(FileCheckpointStore::new(dir.path().join("checkpoints")).unwrap());
    let request =
        JobRequest::new(key(start, end, Timeframe::Hour1)).with_config(config(dir.path(), 2));

    let feed = Arc::new(Feed::market(&days));
    let first = runner(&feed, request.clone(), &store).run().await.unwrap();
    assert!(first.records_written > 0);
    let written = std::fs::read_to_string(&first.output).unwrap();

    let feed = Arc::new(Feed::market(&days));
    let second = runner(&feed, request, &store).run().await.unwrap();
    assert_eq!(second.state, JobState::Completed);
    assert_eq!(second.records_written, 0);
    assert_eq!(second.completed_days, 4);
    assert!(feed.requested().is_empty());
    assert_eq!(std::fs::read_to_string(&second.output).unwrap(), written);
}

#[tokio::test]
async fn test_gaps_are_reported_as_diagnostics() {
    let day = date(2024, 1, 2);
    let dir = TempDir::new().unwrap();
    let feed = Arc::new(Feed::market(&[day]));
    let reporter = Arc::new(ChannelReporter::new(256));
    let mut events = reporter.subscribe();
    let request = JobRequest::new(key(day, day, Timeframe::Hour1)).with_config(config(dir.path(), 1));

    let outcome = runner(&feed, request, &memory_store())
        .with_observer(reporter)
        .run()
        .await
        .unwrap();
    // One candle per trading hour; gaps are flagged but still written.
    assert_eq!(outcome.records_written, TRADING_HOURS.len() as u64);

    let mut gaps = 0;
    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            ProgressEvent::Diagnostic {
                status: ValidationStatus::Gap { delta_ms },
                ..
            } => {
                assert_eq!(delta_ms % 3_600_000, 0);
                gaps += 1;
            }
            ProgressEvent::StateChanged { state, .. } => states.push(state),
            _ => {}
        }
    }
    assert_eq!(gaps, TRADING_HOURS.len() - 1);
    assert_eq!(states, vec![JobState::Running, JobState::Completed]);
}

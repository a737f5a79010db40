//! Per-day retrieval.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use ducat_instruments::HolidayCalendar;
use ducat_types::{
    CancelFlag, Candle, DataSource, DayUnit, Decimal, Instrument, PriceSide, Record, day_start,
    hours_of,
};
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::{
    AttemptError, CircuitBreaker, FetchError, RetryConfig, Transport, decompress_bi5,
    parse_candles, parse_ticks,
    url::{candle_url, host_of, tick_url},
};

/// Default number of hour files fetched concurrently within one day.
pub const DEFAULT_HOUR_CONCURRENCY: usize = 8;

/// The records retrieved for one day unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayData {
    /// The calendar day.
    pub day: NaiveDate,
    /// Records in ascending timestamp order.
    pub records: Vec<Record>,
    /// True if the day was skipped as a non-trading day.
    pub holiday: bool,
    /// Files that downloaded but could not be decoded and were skipped.
    pub corrupt_files: u32,
}

impl DayData {
    /// Creates the empty result for a non-trading day.
    #[must_use]
    pub const fn holiday(day: NaiveDate) -> Self {
        Self {
            day,
            records: Vec::new(),
            holiday: true,
            corrupt_files: 0,
        }
    }
}

/// Retrieves one instrument's data a day at a time.
///
/// Every request is gated by the shared [`CircuitBreaker`], bounded by the
/// [`RetryConfig`] budget and reported back to the breaker when it completes.
pub struct DayFetcher {
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
    calendar: HolidayCalendar,
    instrument: Instrument,
    retry: RetryConfig,
    hour_concurrency: usize,
    price_side: PriceSide,
    host: String,
}

impl std::fmt::Debug for DayFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DayFetcher")
            .field("instrument", &self.instrument)
            .field("host", &self.host)
            .field("hour_concurrency", &self.hour_concurrency)
            .field("price_side", &self.price_side)
            .finish_non_exhaustive()
    }
}

impl DayFetcher {
    /// Creates a fetcher with default calendar, retry budget and concurrency.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        breaker: Arc<CircuitBreaker>,
        instrument: Instrument,
    ) -> Self {
        let host = host_of(transport.base_url()).to_string();
        Self {
            transport,
            breaker,
            calendar: HolidayCalendar::default(),
            instrument,
            retry: RetryConfig::default(),
            hour_concurrency: DEFAULT_HOUR_CONCURRENCY,
            price_side: PriceSide::default(),
            host,
        }
    }

    /// Sets the trading calendar.
    #[must_use]
    pub fn with_calendar(mut self, calendar: HolidayCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets how many hour files of a day are fetched concurrently.
    #[must_use]
    pub fn with_hour_concurrency(mut self, hour_concurrency: usize) -> Self {
        self.hour_concurrency = hour_concurrency.max(1);
        self
    }

    /// Sets which quote side native candles are fetched for.
    #[must_use]
    pub const fn with_price_side(mut self, price_side: PriceSide) -> Self {
        self.price_side = price_side;
        self
    }

    /// Returns the instrument this fetcher retrieves.
    #[must_use]
    pub const fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Returns the host requests are sent to.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns true if `day` carries no trading for this instrument.
    #[must_use]
    pub fn is_non_trading(&self, day: NaiveDate) -> bool {
        self.calendar.is_non_trading(day, self.instrument.category())
    }

    /// Retrieves one day unit.
    ///
    /// Non-trading days return an empty holiday result without touching the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if any file of the day could not be retrieved
    /// within the retry budget, or if cancellation was requested.
    pub async fn fetch(&self, unit: &DayUnit, cancel: &CancelFlag) -> Result<DayData, FetchError> {
        if self.is_non_trading(unit.day) {
            tracing::debug!(day = %unit.day, symbol = %unit.symbol, "skipping non-trading day");
            return Ok(DayData::holiday(unit.day));
        }
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let data = match unit.source {
            DataSource::Ticks => self.fetch_ticks(unit, cancel).await?,
            DataSource::Native => self.fetch_candles(unit, cancel).await?,
        };
        tracing::debug!(
            day = %unit.day,
            symbol = %unit.symbol,
            records = data.records.len(),
            corrupt_files = data.corrupt_files,
            "day fetched"
        );
        Ok(data)
    }

    async fn fetch_ticks(&self, unit: &DayUnit, cancel: &CancelFlag) -> Result<DayData, FetchError> {
        let scale = self.instrument.price_scale();
        let hours: Vec<Option<Vec<Record>>> = stream::iter(hours_of(unit.day))
            .map(|hour| async move {
                let url = tick_url(self.transport.base_url(), &unit.symbol, hour);
                let body = self.request(&url, unit.day, cancel).await?;
                decode_blocking(url, body, move |raw| decode_ticks(raw, hour, scale)).await
            })
            .buffered(self.hour_concurrency)
            .try_collect()
            .await?;

        Ok(assemble(unit.day, hours))
    }

    async fn fetch_candles(
        &self,
        unit: &DayUnit,
        cancel: &CancelFlag,
    ) -> Result<DayData, FetchError> {
        match self.price_side {
            PriceSide::Bid | PriceSide::Ask => {
                let part = self.fetch_candle_side(unit, self.price_side, cancel).await?;
                Ok(assemble(unit.day, vec![part]))
            }
            PriceSide::Mid => {
                let bid = self.fetch_candle_side(unit, PriceSide::Bid, cancel).await?;
                let ask = self.fetch_candle_side(unit, PriceSide::Ask, cancel).await?;
                let corrupt = u32::from(bid.is_none()) + u32::from(ask.is_none());
                let records = match (bid, ask) {
                    (Some(bid), Some(ask)) => mid_candles(&bid, &ask),
                    _ => {
                        tracing::warn!(
                            day = %unit.day,
                            symbol = %unit.symbol,
                            "a quote side is unreadable, mid candles for the day are empty"
                        );
                        Vec::new()
                    }
                };
                let mut data = assemble(unit.day, vec![Some(records)]);
                data.corrupt_files = corrupt;
                Ok(data)
            }
        }
    }

    async fn fetch_candle_side(
        &self,
        unit: &DayUnit,
        side: PriceSide,
        cancel: &CancelFlag,
    ) -> Result<Option<Vec<Record>>, FetchError> {
        let scale = self.instrument.price_scale();
        let start = day_start(unit.day);
        let url = candle_url(self.transport.base_url(), &unit.symbol, unit.day, side);
        let body = self.request(&url, unit.day, cancel).await?;
        decode_blocking(url, body, move |raw| decode_candles(raw, start, scale)).await
    }

    /// Fetches one file, retrying within the budget.
    async fn request(
        &self,
        url: &str,
        day: NaiveDate,
        cancel: &CancelFlag,
    ) -> Result<Option<Bytes>, FetchError> {
        let mut attempts = 0u32;
        let mut waits = 0u32;
        // Time spent polling while another request probes a half-open circuit.
        let mut polled = Duration::ZERO;

        loop {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            if !self.breaker.allow(&self.host) {
                let wait = match self.breaker.retry_after(&self.host) {
                    Some(cooldown) => {
                        if waits >= self.retry.max_cooldown_waits {
                            tracing::warn!(host = %self.host, %day, waits, "circuit stayed open");
                            return Err(FetchError::CircuitOpen {
                                host: self.host.clone(),
                                waits,
                            });
                        }
                        waits += 1;
                        polled = Duration::ZERO;
                        cooldown
                    }
                    None => {
                        // The half-open request is itself bounded by the attempt timeout.
                        if polled > self.retry.attempt_timeout() {
                            tracing::warn!(host = %self.host, %day, "half-open request never settled");
                            return Err(FetchError::CircuitOpen {
                                host: self.host.clone(),
                                waits,
                            });
                        }
                        let poll = self.retry.probe_poll();
                        polled += poll;
                        poll
                    }
                };
                tracing::debug!(host = %self.host, wait_ms = wait.as_millis() as u64, "waiting for circuit");
                tokio::time::sleep(wait).await;
                continue;
            }

            attempts += 1;
            let outcome = tokio::time::timeout(self.retry.attempt_timeout(), self.transport.get(url))
                .await
                .unwrap_or(Err(AttemptError::Timeout));

            let error = match outcome {
                Ok(body) => {
                    self.breaker.record_success(&self.host);
                    return Ok(body);
                }
                Err(error) => error,
            };

            match error.failure_kind() {
                Some(kind) => self.breaker.record_failure(&self.host, kind),
                None => self.breaker.record_success(&self.host),
            }

            if !error.is_retryable() {
                tracing::warn!(url, %error, "request rejected");
                return Err(FetchError::Rejected { day, source: error });
            }
            if attempts >= self.retry.max_attempts {
                tracing::warn!(url, attempts, %error, "retry budget exhausted");
                return Err(FetchError::Exhausted {
                    day,
                    attempts,
                    last: error,
                });
            }

            let delay = self.retry.backoff(attempts);
            tracing::debug!(url, attempts, %error, delay_ms = delay.as_millis() as u64, "retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Decodes a body off the async runtime.
///
/// Returns `Ok(None)` for a body that could not be decoded; such files are
/// logged and skipped rather than retried.
async fn decode_blocking<F>(
    url: String,
    body: Option<Bytes>,
    decode: F,
) -> Result<Option<Vec<Record>>, FetchError>
where
    F: FnOnce(&[u8]) -> Result<Vec<Record>, String> + Send + 'static,
{
    let Some(body) = body else {
        return Ok(Some(Vec::new()));
    };

    let decoded = tokio::task::spawn_blocking(move || {
        let raw = decompress_bi5(&body).map_err(|e| e.to_string())?;
        decode(&raw)
    })
    .await
    .map_err(|e| FetchError::Worker(e.to_string()))?;

    match decoded {
        Ok(records) => Ok(Some(records)),
        Err(error) => {
            tracing::warn!(%url, %error, "skipping corrupt file");
            Ok(None)
        }
    }
}

fn decode_ticks(raw: &[u8], hour: DateTime<Utc>, scale: u32) -> Result<Vec<Record>, String> {
    Ok(parse_ticks(raw)
        .map_err(|e| e.to_string())?
        .map(|t| Record::Tick(t.normalize(hour, scale)))
        .collect())
}

fn decode_candles(raw: &[u8], start: DateTime<Utc>, scale: u32) -> Result<Vec<Record>, String> {
    Ok(parse_candles(raw)
        .map_err(|e| e.to_string())?
        .map(|c| Record::Candle(c.normalize(start, scale)))
        .collect())
}

/// Joins per-file results into a day, ordered by timestamp.
fn assemble(day: NaiveDate, parts: Vec<Option<Vec<Record>>>) -> DayData {
    let corrupt_files = parts.iter().filter(|p| p.is_none()).count() as u32;
    let mut records: Vec<Record> = parts.into_iter().flatten().flatten().collect();
    // Stable, so equal timestamps keep feed order.
    records.sort_by_key(Record::timestamp);
    DayData {
        day,
        records,
        holiday: false,
        corrupt_files,
    }
}

/// Averages bid and ask minute candles that share a timestamp.
///
/// Volume is the sum of both sides, matching tick aggregation. Minutes
/// present on one side only are dropped.
fn mid_candles(bid: &[Record], ask: &[Record]) -> Vec<Record> {
    let asks: BTreeMap<DateTime<Utc>, &Candle> = ask
        .iter()
        .filter_map(|r| match r {
            Record::Candle(c) => Some((c.timestamp, c)),
            Record::Tick(_) => None,
        })
        .collect();
    let mid = |a: Decimal, b: Decimal| (a + b) / Decimal::TWO;

    bid.iter()
        .filter_map(|r| match r {
            Record::Candle(b) => asks.get(&b.timestamp).map(|a| {
                Record::Candle(Candle {
                    timestamp: b.timestamp,
                    open: mid(b.open, a.open),
                    high: mid(b.high, a.high),
                    low: mid(b.low, a.low),
                    close: mid(b.close, a.close),
                    volume: b.volume + a.volume,
                    timeframe: b.timeframe,
                })
            }),
            Record::Tick(_) => None,
        })
        .collect()
}

//! Streaming candle aggregation on a fixed epoch grid.

use chrono::{DateTime, TimeDelta, Utc};
use ducat_types::{Candle, PriceSide, Record, Timeframe};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// The bucket still open at the end of the data seen so far.
///
/// Carry state is owned by whoever drives the [`Aggregator`] and is handed
/// back on every call, so it can be persisted between day units and restored
/// in a later process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarryState {
    bucket: Option<Bucket>,
}

impl CarryState {
    /// Returns true if no bucket is open.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bucket.is_none()
    }

    /// Returns the start of the open bucket, if any.
    #[must_use]
    pub fn open_bucket(&self) -> Option<DateTime<Utc>> {
        self.bucket.as_ref().map(|b| b.start)
    }
}

/// Unrounded accumulation of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Bucket {
    start: DateTime<Utc>,
    start_ms: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl Bucket {
    fn merge(&mut self, sample: &Sample) {
        self.high = self.high.max(sample.high);
        self.low = self.low.min(sample.low);
        self.close = sample.close;
        self.volume += sample.volume;
    }
}

/// One record reduced to the values a bucket needs.
#[derive(Debug)]
struct Sample {
    timestamp: DateTime<Utc>,
    timestamp_ms: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

/// Converts an ordered record stream into candles.
///
/// Buckets are `timeframe` wide and aligned to the Unix epoch, never reset at
/// midnight. Ticks contribute the price on the configured side and their
/// total volume; one-minute candles merge into wider buckets. Prices are
/// rounded half-to-even to `price_scale` places once, when a bucket closes.
///
/// With [`Timeframe::Tick`] records pass through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    timeframe: Timeframe,
    price_side: PriceSide,
    price_scale: u32,
}

impl Aggregator {
    /// Creates a new aggregator.
    #[must_use]
    pub const fn new(timeframe: Timeframe, price_side: PriceSide, price_scale: u32) -> Self {
        Self {
            timeframe,
            price_side,
            price_scale,
        }
    }

    /// Returns the timeframe being aggregated to.
    #[must_use]
    pub const fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Aggregates the next chunk of records.
    ///
    /// Returns every candle closed by this chunk and the carry state to pass
    /// to the next call. An empty chunk returns `carry` unchanged. Records must
    /// be in ascending timestamp order; a record older than the open bucket is
    /// dropped.
    #[must_use]
    pub fn aggregate(&self, records: &[Record], carry: CarryState) -> (Vec<Record>, CarryState) {
        let Some(width) = self.timeframe.milliseconds() else {
            return (records.to_vec(), carry);
        };

        let mut closed = Vec::new();
        let mut bucket = carry.bucket;

        for record in records {
            let sample = self.sample(record);
            let start_ms = sample.timestamp_ms.div_euclid(width) * width;

            match bucket.as_mut() {
                Some(open) if open.start_ms == start_ms => open.merge(&sample),
                Some(open) if start_ms < open.start_ms => {
                    tracing::debug!(
                        timestamp = %sample.timestamp,
                        bucket = %open.start,
                        "dropping record older than the open bucket"
                    );
                }
                _ => {
                    if let Some(done) = bucket.take() {
                        closed.push(Record::Candle(self.close(done)));
                    }
                    bucket = Some(Bucket {
                        start: sample.timestamp
                            - TimeDelta::milliseconds(sample.timestamp_ms - start_ms),
                        start_ms,
                        open: sample.open,
                        high: sample.high,
                        low: sample.low,
                        close: sample.close,
                        volume: sample.volume,
                    });
                }
            }
        }

        (closed, CarryState { bucket })
    }

    /// Closes the open bucket if it ends at or before `until`.
    ///
    /// Call with the end of the data just aggregated (e.g. the next midnight)
    /// once no later record can fall into the bucket. Buckets that extend past
    /// `until` stay open.
    #[must_use]
    pub fn seal(&self, carry: CarryState, until: DateTime<Utc>) -> (Option<Candle>, CarryState) {
        let Some(width) = self.timeframe.milliseconds() else {
            return (None, carry);
        };
        match carry.bucket {
            Some(bucket) if bucket.start_ms + width <= until.timestamp_millis() => {
                (Some(self.close(bucket)), CarryState::default())
            }
            bucket => (None, CarryState { bucket }),
        }
    }

    /// Closes whatever bucket is open, at the end of a job.
    #[must_use]
    pub fn finish(&self, carry: CarryState) -> Option<Candle> {
        carry.bucket.map(|bucket| self.close(bucket))
    }

    fn sample(&self, record: &Record) -> Sample {
        match record {
            Record::Tick(tick) => {
                let price = tick.price(self.price_side);
                Sample {
                    timestamp: tick.timestamp,
                    timestamp_ms: tick.timestamp.timestamp_millis(),
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: tick.total_volume(),
                }
            }
            Record::Candle(candle) => Sample {
                timestamp: candle.timestamp,
                timestamp_ms: candle.timestamp.timestamp_millis(),
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                volume: candle.volume,
            },
        }
    }

    fn close(&self, bucket: Bucket) -> Candle {
        Candle {
            timestamp: bucket.start,
            open: self.round(bucket.open),
            high: self.round(bucket.high),
            low: self.round(bucket.low),
            close: self.round(bucket.close),
            volume: bucket.volume,
            timeframe: self.timeframe,
        }
    }

    fn round(&self, price: Decimal) -> Decimal {
        let mut rounded =
            price.round_dp_with_strategy(self.price_scale, RoundingStrategy::MidpointNearestEven);
        rounded.rescale(self.price_scale);
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ducat_types::Tick;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, m, s).unwrap()
    }

    fn tick(ts: DateTime<Utc>, ask: &str, bid: &str, volume: i64) -> Record {
        Record::Tick(Tick::new(
            ts,
            dec(ask),
            dec(bid),
            Decimal::from(volume),
            Decimal::from(volume),
        ))
    }

    fn candles(records: &[Record]) -> Vec<Candle> {
        records
            .iter()
            .map(|r| match r {
                Record::Candle(c) => *c,
                Record::Tick(_) => panic!("expected candle"),
            })
            .collect()
    }

    #[test]
    fn test_minute_aggregation() {
        let agg = Aggregator::new(Timeframe::Minute1, PriceSide::Ask, 5);
        let records = [
            tick(at(1, 12, 0, 0), "1.10010", "1.10000", 1),
            tick(at(1, 12, 0, 30), "1.10100", "1.10050", 2),
            tick(at(1, 12, 0, 45), "1.09950", "1.09940", 3),
            tick(at(1, 12, 1, 0), "1.09900", "1.09850", 4),
        ];

        let (out, carry) = agg.aggregate(&records, CarryState::default());
        let bars = candles(&out);

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, at(1, 12, 0, 0));
        assert_eq!(bars[0].open, dec("1.10010"));
        assert_eq!(bars[0].high, dec("1.10100"));
        assert_eq!(bars[0].low, dec("1.09950"));
        assert_eq!(bars[0].close, dec("1.09950"));
        assert_eq!(bars[0].volume, dec("12"));
        assert_eq!(carry.open_bucket(), Some(at(1, 12, 1, 0)));
    }

    #[test]
    fn test_seven_hour_candle_spans_midnight() {
        // The 7h epoch grid puts a boundary at 23:00 on 2024-01-01.
        let agg = Aggregator::new(Timeframe::Custom(7 * 3600), PriceSide::Ask, 5);
        let day_one = [
            tick(at(1, 23, 0, 5), "1.10000", "1.09990", 1),
            tick(at(1, 23, 40, 0), "1.10050", "1.10040", 2),
        ];
        let day_two = [
            tick(at(2, 0, 5, 0), "1.09900", "1.09890", 3),
            tick(at(2, 0, 50, 0), "1.10020", "1.10010", 4),
        ];

        let (out, carry) = agg.aggregate(&day_one, CarryState::default());
        assert!(out.is_empty());
        let (sealed, carry) = agg.seal(carry, at(2, 0, 0, 0));
        assert!(sealed.is_none());

        let (out, carry) = agg.aggregate(&day_two, carry);
        assert!(out.is_empty());
        let candle = agg.finish(carry).unwrap();

        assert_eq!(candle.timestamp, at(1, 23, 0, 0));
        assert_eq!(candle.open, dec("1.10000"));
        assert_eq!(candle.high, dec("1.10050"));
        assert_eq!(candle.low, dec("1.09900"));
        assert_eq!(candle.close, dec("1.10020"));
        assert_eq!(candle.volume, dec("20"));
    }

    #[test]
    fn test_seal_closes_bucket_ending_at_midnight() {
        let agg = Aggregator::new(Timeframe::Hour4, PriceSide::Bid, 5);
        let (out, carry) = agg.aggregate(
            &[tick(at(1, 21, 0, 0), "1.1", "1.0", 1)],
            CarryState::default(),
        );
        assert!(out.is_empty());

        let (sealed, carry) = agg.seal(carry, at(2, 0, 0, 0));
        let candle = sealed.unwrap();
        assert_eq!(candle.timestamp, at(1, 20, 0, 0));
        assert_eq!(candle.open, dec("1.00000"));
        assert!(carry.is_empty());
    }

    #[test]
    fn test_empty_chunk_passes_carry_through() {
        let agg = Aggregator::new(Timeframe::Hour1, PriceSide::Ask, 5);
        let (_, carry) = agg.aggregate(
            &[tick(at(1, 10, 0, 0), "1.1", "1.0", 1)],
            CarryState::default(),
        );

        let (out, after) = agg.aggregate(&[], carry.clone());
        assert!(out.is_empty());
        assert_eq!(after, carry);
    }

    #[test]
    fn test_mid_rounds_half_to_even_at_close() {
        let agg = Aggregator::new(Timeframe::Minute1, PriceSide::Mid, 5);
        let records = [
            tick(at(1, 0, 0, 0), "1.00001", "1.00000", 1),
            tick(at(1, 0, 0, 1), "1.00003", "1.00000", 1),
        ];
        let candle = agg.finish(agg.aggregate(&records, CarryState::default()).1).unwrap();

        // 1.000005 rounds down to the even digit, 1.000015 rounds up.
        assert_eq!(candle.open, dec("1.00000"));
        assert_eq!(candle.close, dec("1.00002"));
        assert_eq!(candle.open.to_string(), "1.00000");
    }

    #[test]
    fn test_minute_candles_merge_into_wider_buckets() {
        let agg = Aggregator::new(Timeframe::Minute5, PriceSide::Bid, 5);
        let minute = |m: u32, o: &str, h: &str, l: &str, c: &str| {
            Record::Candle(Candle {
                timestamp: at(1, 9, m, 0),
                open: dec(o),
                high: dec(h),
                low: dec(l),
                close: dec(c),
                volume: dec("1.25"),
                timeframe: Timeframe::Minute1,
            })
        };
        let records = [
            minute(0, "1.1", "1.3", "1.0", "1.2"),
            minute(4, "1.2", "1.4", "1.1", "1.15"),
            minute(5, "1.15", "1.2", "1.1", "1.2"),
        ];

        let (out, carry) = agg.aggregate(&records, CarryState::default());
        let bars = candles(&out);

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].open, dec("1.1"));
        assert_eq!(bars[0].high, dec("1.4"));
        assert_eq!(bars[0].low, dec("1.0"));
        assert_eq!(bars[0].close, dec("1.15"));
        assert_eq!(bars[0].volume, dec("2.50"));
        assert_eq!(bars[0].timeframe, Timeframe::Minute5);
        assert_eq!(carry.open_bucket(), Some(at(1, 9, 5, 0)));
    }

    #[test]
    fn test_tick_timeframe_passes_through() {
        let agg = Aggregator::new(Timeframe::Tick, PriceSide::Ask, 5);
        let records = [tick(at(1, 1, 0, 0), "1.1", "1.0", 1)];
        let (out, carry) = agg.aggregate(&records, CarryState::default());
        assert_eq!(out, records.to_vec());
        assert!(carry.is_empty());
        assert!(agg.finish(carry).is_none());
    }

    #[test]
    fn test_carry_survives_serialization() {
        let agg = Aggregator::new(Timeframe::Custom(7 * 3600), PriceSide::Mid, 5);
        let (_, carry) = agg.aggregate(
            &[tick(at(1, 23, 30, 0), "1.10001", "1.10000", 1)],
            CarryState::default(),
        );

        let json = serde_json::to_string(&carry).unwrap();
        let restored: CarryState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, carry);

        let later = [tick(at(2, 1, 0, 0), "1.2", "1.1", 1)];
        assert_eq!(
            agg.finish(agg.aggregate(&later, restored).1),
            agg.finish(agg.aggregate(&later, carry).1)
        );
    }

    fn synthetic_ticks(raw: Vec<(i64, u32, u32)>) -> Vec<Record> {
        let origin = at(1, 0, 0, 0);
        let mut raw = raw;
        raw.sort_by_key(|r| r.0);
        raw.into_iter()
            .map(|(offset_ms, price, volume)| {
                let ts = origin + TimeDelta::milliseconds(offset_ms);
                let ask = Decimal::new(i64::from(price) + 3, 5);
                let bid = Decimal::new(i64::from(price), 5);
                Record::Tick(Tick::new(ts, ask, bid, Decimal::from(volume), Decimal::ZERO))
            })
            .collect()
    }

    fn run_whole(agg: &Aggregator, records: &[Record]) -> Vec<Record> {
        let (mut out, carry) = agg.aggregate(records, CarryState::default());
        out.extend(agg.finish(carry).map(Record::Candle));
        out
    }

    const DAY_MS: i64 = 86_400_000;
    const WIDTHS: [u32; 6] = [60, 300, 3_600, 5_400, 25_200, 86_400];

    proptest! {
        #[test]
        fn prop_arbitrary_chunking_is_invariant(
            raw in prop::collection::vec((0i64..3 * DAY_MS, 100_000u32..100_500, 0u32..50), 0..200),
            width_idx in 0usize..WIDTHS.len(),
            side_idx in 0usize..3,
            cuts in prop::collection::vec(0usize..200, 0..6),
        ) {
            let side = [PriceSide::Bid, PriceSide::Ask, PriceSide::Mid][side_idx];
            let agg = Aggregator::new(Timeframe::Custom(WIDTHS[width_idx]), side, 5);
            let records = synthetic_ticks(raw);
            let whole = run_whole(&agg, &records);

            let mut cuts: Vec<usize> = cuts.into_iter().map(|c| c.min(records.len())).collect();
            cuts.sort_unstable();
            let mut chunked = Vec::new();
            let mut carry = CarryState::default();
            let mut from = 0;
            for cut in cuts.into_iter().chain(std::iter::once(records.len())) {
                let (out, next) = agg.aggregate(&records[from..cut], carry);
                chunked.extend(out);
                carry = next;
                from = cut;
            }
            chunked.extend(agg.finish(carry).map(Record::Candle));

            prop_assert_eq!(whole, chunked);
        }

        #[test]
        fn prop_day_chunks_with_seal_are_invariant(
            raw in prop::collection::vec((0i64..3 * DAY_MS, 100_000u32..100_500, 0u32..50), 0..200),
            width_idx in 0usize..WIDTHS.len(),
        ) {
            let agg = Aggregator::new(Timeframe::Custom(WIDTHS[width_idx]), PriceSide::Mid, 5);
            let records = synthetic_ticks(raw);
            let whole = run_whole(&agg, &records);

            let mut chunked = Vec::new();
            let mut carry = CarryState::default();
            for day in 0..3 {
                let midnight = at(1, 0, 0, 0) + TimeDelta::milliseconds((day + 1) * DAY_MS);
                let chunk: Vec<Record> = records
                    .iter()
                    .filter(|r| {
                        let offset = (r.timestamp() - at(1, 0, 0, 0)).num_milliseconds();
                        offset.div_euclid(DAY_MS) == day
                    })
                    .copied()
                    .collect();
                let (out, next) = agg.aggregate(&chunk, carry);
                chunked.extend(out);
                let (sealed, next) = agg.seal(next, midnight);
                chunked.extend(sealed.map(Record::Candle));
                carry = next;
            }
            chunked.extend(agg.finish(carry).map(Record::Candle));

            prop_assert_eq!(whole, chunked);
        }

        #[test]
        fn prop_candles_are_consistent(
            raw in prop::collection::vec((0i64..DAY_MS, 100_000u32..100_500, 0u32..50), 1..200),
            width_idx in 0usize..WIDTHS.len(),
        ) {
            let agg = Aggregator::new(Timeframe::Custom(WIDTHS[width_idx]), PriceSide::Mid, 5);
            for record in run_whole(&agg, &synthetic_ticks(raw)) {
                prop_assert!(record.is_consistent());
            }
        }
    }
}

//! OHLCV candle representation.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::{Decimal, RoundingStrategy, prelude::FromPrimitive};
use serde::{Deserialize, Serialize};

use crate::Timeframe;

/// An OHLCV candle covering one bucket of the epoch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Start of the bucket (UTC).
    pub timestamp: DateTime<Utc>,
    /// First price in the bucket.
    pub open: Decimal,
    /// Highest price in the bucket.
    pub high: Decimal,
    /// Lowest price in the bucket.
    pub low: Decimal,
    /// Last price in the bucket.
    pub close: Decimal,
    /// Total volume traded in the bucket.
    pub volume: Decimal,
    /// Bucket width.
    pub timeframe: Timeframe,
}

impl Candle {
    /// Returns true if `high >= max(open, close)`, `low <= min(open, close)`
    /// and the volume is non-negative.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
            && self.volume >= Decimal::ZERO
    }

    /// Returns the high-low range.
    #[must_use]
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }

    /// Returns the absolute difference between open and close.
    #[must_use]
    pub fn body(&self) -> Decimal {
        (self.close - self.open).abs()
    }

    /// Returns true if the candle closed above its open.
    #[must_use]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Returns true if the candle closed below its open.
    #[must_use]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Raw one-minute candle as read from a native bi5 candle file.
///
/// Each record is 24 bytes in big-endian order:
/// - `u32`: seconds offset from day start
/// - `u32`: open, close, low, high in points (in that order)
/// - `f32`: volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandle {
    /// Seconds offset from the day start.
    pub sec_offset: u32,
    /// Raw open price.
    pub open_raw: u32,
    /// Raw close price.
    pub close_raw: u32,
    /// Raw low price.
    pub low_raw: u32,
    /// Raw high price.
    pub high_raw: u32,
    /// Volume.
    pub volume: f32,
}

impl RawCandle {
    /// Size in bytes of a raw candle record.
    pub const SIZE: usize = 24;

    /// Normalizes the raw candle at the instrument's price scale.
    ///
    /// Volume is rounded to two decimal places, half to even.
    #[must_use]
    pub fn normalize(self, day_start: DateTime<Utc>, price_scale: u32) -> Candle {
        let price = |raw: u32| Decimal::new(i64::from(raw), price_scale);
        let volume = Decimal::from_f32(self.volume)
            .unwrap_or(Decimal::ZERO)
            .max(Decimal::ZERO)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);

        Candle {
            timestamp: day_start + TimeDelta::seconds(i64::from(self.sec_offset)),
            open: price(self.open_raw),
            high: price(self.high_raw),
            low: price(self.low_raw),
            close: price(self.close_raw),
            volume,
            timeframe: Timeframe::Minute1,
        }
    }
}

//! Tick data representation.

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::PriceSide;

/// Multiplier applied to bi5 float volumes to obtain integer volume units.
pub const VOLUME_MULTIPLIER: f64 = 1_000_000.0;

/// A single tick representing a price update.
///
/// Prices are exact decimals at the instrument's precision and volumes are
/// integer units, so no float arithmetic happens after parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp of the tick (UTC).
    pub timestamp: DateTime<Utc>,
    /// Ask (offer) price.
    pub ask: Decimal,
    /// Bid price.
    pub bid: Decimal,
    /// Volume available at the ask price.
    pub ask_volume: Decimal,
    /// Volume available at the bid price.
    pub bid_volume: Decimal,
}

impl Tick {
    /// Creates a new tick.
    #[must_use]
    pub const fn new(
        timestamp: DateTime<Utc>,
        ask: Decimal,
        bid: Decimal,
        ask_volume: Decimal,
        bid_volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            ask,
            bid,
            ask_volume,
            bid_volume,
        }
    }

    /// Returns the mid price (average of ask and bid), unrounded.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.ask + self.bid) / Decimal::TWO
    }

    /// Returns the spread (ask - bid).
    #[must_use]
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Returns the price on the requested side of the quote.
    #[must_use]
    pub fn price(&self, side: PriceSide) -> Decimal {
        match side {
            PriceSide::Bid => self.bid,
            PriceSide::Ask => self.ask,
            PriceSide::Mid => self.mid(),
        }
    }

    /// Returns the total volume (ask + bid volume).
    #[must_use]
    pub fn total_volume(&self) -> Decimal {
        self.ask_volume + self.bid_volume
    }

    /// Returns the timestamp in milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Raw tick as read from a bi5 file (before price normalization).
///
/// The bi5 format stores ticks as 20 bytes in big-endian order:
/// - `u32`: milliseconds offset from hour start
/// - `u32`: ask price in points
/// - `u32`: bid price in points
/// - `f32`: ask volume in millions
/// - `f32`: bid volume in millions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawTick {
    /// Milliseconds offset from the hour start.
    pub ms_offset: u32,
    /// Raw ask price in points.
    pub ask_raw: u32,
    /// Raw bid price in points.
    pub bid_raw: u32,
    /// Ask volume.
    pub ask_volume: f32,
    /// Bid volume.
    pub bid_volume: f32,
}

impl RawTick {
    /// Size in bytes of a raw tick record.
    pub const SIZE: usize = 20;

    /// Creates a new raw tick.
    #[must_use]
    pub const fn new(
        ms_offset: u32,
        ask_raw: u32,
        bid_raw: u32,
        ask_volume: f32,
        bid_volume: f32,
    ) -> Self {
        Self {
            ms_offset,
            ask_raw,
            bid_raw,
            ask_volume,
            bid_volume,
        }
    }

    /// Normalizes the raw tick at the instrument's price scale.
    ///
    /// `price_scale` is the number of decimal places, so EUR/USD (scale 5)
    /// turns a raw price of 112345 into exactly 1.12345. Volumes are scaled by
    /// [`VOLUME_MULTIPLIER`] and rounded to whole units.
    #[must_use]
    pub fn normalize(self, hour_start: DateTime<Utc>, price_scale: u32) -> Tick {
        let timestamp = hour_start + TimeDelta::milliseconds(i64::from(self.ms_offset));
        Tick {
            timestamp,
            ask: Decimal::new(i64::from(self.ask_raw), price_scale),
            bid: Decimal::new(i64::from(self.bid_raw), price_scale),
            ask_volume: scale_volume(self.ask_volume),
            bid_volume: scale_volume(self.bid_volume),
        }
    }
}

fn scale_volume(volume: f32) -> Decimal {
    let units = (f64::from(volume) * VOLUME_MULTIPLIER).round();
    if units.is_finite() && units > 0.0 {
        Decimal::from(units as i64)
    } else {
        Decimal::ZERO
    }
}

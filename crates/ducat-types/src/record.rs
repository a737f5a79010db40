//! Records flowing through validation and output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Candle, Tick};

/// A single output record: either a raw tick or a closed candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Record {
    /// A raw tick (tick timeframe).
    Tick(Tick),
    /// An aggregated candle.
    Candle(Candle),
}

impl Record {
    /// Returns the record timestamp (bucket start for candles).
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Tick(t) => t.timestamp,
            Self::Candle(c) => c.timestamp,
        }
    }

    /// Returns the kind of record.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Tick(_) => RecordKind::Tick,
            Self::Candle(_) => RecordKind::Candle,
        }
    }

    /// Returns false only for candles that violate the OHLC invariant.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        match self {
            Self::Tick(_) => true,
            Self::Candle(c) => c.is_consistent(),
        }
    }
}

impl From<Tick> for Record {
    fn from(tick: Tick) -> Self {
        Self::Tick(tick)
    }
}

impl From<Candle> for Record {
    fn from(candle: Candle) -> Self {
        Self::Candle(candle)
    }
}

/// The shape of records in a stream, which fixes the output columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Tick rows: timestamp, ask, bid, `ask_volume`, `bid_volume`.
    Tick,
    /// Candle rows: timestamp, open, high, low, close, volume.
    Candle,
}

//! Candle timeframe definitions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Candle timeframe.
///
/// Every non-tick timeframe is a fixed bucket width on a grid anchored at the
/// Unix epoch, so buckets are not reset at day boundaries. Widths that do not
/// divide a day evenly (e.g. seven hours) therefore produce candles spanning
/// midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    /// Tick-by-tick (no aggregation).
    #[default]
    Tick,
    /// 1-second bars.
    Second1,
    /// 1-minute bars.
    Minute1,
    /// 5-minute bars.
    Minute5,
    /// 15-minute bars.
    Minute15,
    /// 30-minute bars.
    Minute30,
    /// 1-hour bars.
    Hour1,
    /// 4-hour bars.
    Hour4,
    /// Daily bars.
    Day1,
    /// Any other width, in seconds.
    Custom(u32),
}

const MINUTE: u32 = 60;
const HOUR: u32 = 3_600;
const DAY: u32 = 86_400;

impl Timeframe {
    /// Builds a timeframe from a bucket width in seconds.
    ///
    /// Widths matching a standard timeframe map to that variant, so
    /// `from_seconds(3600)` is [`Timeframe::Hour1`]. Returns `None` for zero.
    #[must_use]
    pub const fn from_seconds(seconds: u32) -> Option<Self> {
        Some(match seconds {
            0 => return None,
            1 => Self::Second1,
            60 => Self::Minute1,
            300 => Self::Minute5,
            900 => Self::Minute15,
            1_800 => Self::Minute30,
            3_600 => Self::Hour1,
            14_400 => Self::Hour4,
            86_400 => Self::Day1,
            other => Self::Custom(other),
        })
    }

    /// Returns the duration in seconds, or None for tick data.
    #[must_use]
    pub const fn seconds(&self) -> Option<u32> {
        match self {
            Self::Tick => None,
            Self::Second1 => Some(1),
            Self::Minute1 => Some(MINUTE),
            Self::Minute5 => Some(5 * MINUTE),
            Self::Minute15 => Some(15 * MINUTE),
            Self::Minute30 => Some(30 * MINUTE),
            Self::Hour1 => Some(HOUR),
            Self::Hour4 => Some(4 * HOUR),
            Self::Day1 => Some(DAY),
            Self::Custom(s) => Some(*s),
        }
    }

    /// Returns the duration in milliseconds, or None for tick data.
    #[must_use]
    pub const fn milliseconds(&self) -> Option<i64> {
        match self.seconds() {
            Some(s) => Some(s as i64 * 1000),
            None => None,
        }
    }

    /// Returns true if this is tick data (no aggregation).
    #[must_use]
    pub const fn is_tick(&self) -> bool {
        matches!(self, Self::Tick)
    }

    /// Returns the standard timeframes.
    #[must_use]
    pub const fn standard() -> &'static [Self] {
        &[
            Self::Tick,
            Self::Second1,
            Self::Minute1,
            Self::Minute5,
            Self::Minute15,
            Self::Minute30,
            Self::Hour1,
            Self::Hour4,
            Self::Day1,
        ]
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(seconds) = self.seconds() else {
            return f.write_str("tick");
        };
        // Letter first, largest unit that divides evenly.
        if seconds % DAY == 0 {
            write!(f, "d{}", seconds / DAY)
        } else if seconds % HOUR == 0 {
            write!(f, "h{}", seconds / HOUR)
        } else if seconds % MINUTE == 0 {
            write!(f, "m{}", seconds / MINUTE)
        } else {
            write!(f, "s{seconds}")
        }
    }
}

impl FromStr for Timeframe {
    type Err = TimeframeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "tick" | "ticks" => Ok(Self::Tick),
            "second" | "second1" => Ok(Self::Second1),
            "minute" | "minute1" => Ok(Self::Minute1),
            "minute5" => Ok(Self::Minute5),
            "minute15" => Ok(Self::Minute15),
            "minute30" => Ok(Self::Minute30),
            "hour" | "hour1" => Ok(Self::Hour1),
            "hour4" => Ok(Self::Hour4),
            "day" | "day1" | "daily" => Ok(Self::Day1),
            other => parse_width(other).ok_or_else(|| TimeframeParseError(s.to_string())),
        }
    }
}

/// Parses `<unit><count>` or `<count><unit>`, e.g. `h7` or `7h`.
fn parse_width(s: &str) -> Option<Timeframe> {
    let first = s.chars().next()?;
    let last = s.chars().last()?;
    let (unit, count) = if first.is_ascii_alphabetic() {
        (first, &s[1..])
    } else if last.is_ascii_alphabetic() {
        (last, &s[..s.len() - 1])
    } else {
        return None;
    };

    let count: u32 = count.parse().ok()?;
    let unit_seconds = match unit {
        's' => 1,
        'm' => MINUTE,
        'h' => HOUR,
        'd' => DAY,
        _ => return None,
    };
    Timeframe::from_seconds(count.checked_mul(unit_seconds)?)
}

impl TryFrom<String> for Timeframe {
    type Error = TimeframeParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(timeframe: Timeframe) -> Self {
        timeframe.to_string()
    }
}

/// Error returned when parsing an invalid timeframe string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeParseError(String);

impl std::fmt::Display for TimeframeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid timeframe '{}', expected tick or a width such as s1, m1, m5, h1, h4, 7h, d1",
            self.0
        )
    }
}

impl std::error::Error for TimeframeParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_seconds() {
        assert_eq!(Timeframe::Tick.seconds(), None);
        assert_eq!(Timeframe::Minute1.seconds(), Some(60));
        assert_eq!(Timeframe::Hour1.seconds(), Some(3600));
        assert_eq!(Timeframe::Day1.seconds(), Some(86400));
        assert_eq!(Timeframe::Custom(25_200).milliseconds(), Some(25_200_000));
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("m1".parse::<Timeframe>().unwrap(), Timeframe::Minute1);
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::Hour1);
        assert_eq!("H4".parse::<Timeframe>().unwrap(), Timeframe::Hour4);
        assert_eq!("60m".parse::<Timeframe>().unwrap(), Timeframe::Hour1);
        assert!("invalid".parse::<Timeframe>().is_err());
        assert!("0h".parse::<Timeframe>().is_err());
        assert!("7w".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_custom_timeframe_round_trips_through_display() {
        let seven_hours: Timeframe = "7h".parse().unwrap();
        assert_eq!(seven_hours, Timeframe::Custom(25_200));
        assert_eq!(seven_hours.to_string(), "h7");
        assert_eq!("90m".parse::<Timeframe>().unwrap().to_string(), "m90");
        assert_eq!(Timeframe::Hour4.to_string(), "h4");
        assert_eq!(Timeframe::Tick.to_string(), "tick");
    }

    #[test]
    fn test_timeframe_serde_as_string() {
        let json = serde_json::to_string(&Timeframe::Custom(25_200)).unwrap();
        assert_eq!(json, "\"h7\"");
        let parsed: Timeframe = serde_json::from_str("\"m5\"").unwrap();
        assert_eq!(parsed, Timeframe::Minute5);
    }
}

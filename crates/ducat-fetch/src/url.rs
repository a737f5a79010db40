//! Datafeed URL construction.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use ducat_types::{PriceSide, Symbol};

/// Base URL for the Dukascopy data feed.
pub const BASE_URL: &str = "https://datafeed.dukascopy.com/datafeed";

/// Builds the URL for one hour of tick data.
///
/// URL format: `{base}/{SYMBOL}/{YEAR}/{MONTH}/{DAY}/{HOUR}h_ticks.bi5`
///
/// Note: the feed uses 0-indexed months (January = 00).
///
/// # Example
///
/// ```
/// use ducat_fetch::url::{BASE_URL, tick_url};
/// use ducat_types::Symbol;
/// use chrono::{TimeZone, Utc};
///
/// let hour = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
/// let url = tick_url(BASE_URL, &Symbol::new("eurusd").unwrap(), hour);
/// assert_eq!(url, "https://datafeed.dukascopy.com/datafeed/EURUSD/2024/00/15/12h_ticks.bi5");
/// ```
#[must_use]
pub fn tick_url(base: &str, symbol: &Symbol, hour: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}/{:02}/{:02}/{:02}h_ticks.bi5",
        base.trim_end_matches('/'),
        symbol,
        hour.year(),
        hour.month0(),
        hour.day(),
        hour.hour()
    )
}

/// Builds the URL for one day of native one-minute candles.
///
/// URL format: `{base}/{SYMBOL}/{YEAR}/{MONTH}/{DAY}/{SIDE}_candles_min_1.bi5`
///
/// Only [`PriceSide::Bid`] and [`PriceSide::Ask`] exist on the feed.
#[must_use]
pub fn candle_url(base: &str, symbol: &Symbol, day: NaiveDate, side: PriceSide) -> String {
    format!(
        "{}/{}/{}/{:02}/{:02}/{}_candles_min_1.bi5",
        base.trim_end_matches('/'),
        symbol,
        day.year(),
        day.month0(),
        day.day(),
        side.as_upper()
    )
}

/// Returns the host portion of a URL, used to key the circuit breaker.
#[must_use]
pub fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme)
}

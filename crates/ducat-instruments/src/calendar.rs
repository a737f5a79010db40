//! Trading calendar.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, Weekday};
use ducat_types::Category;
use serde::{Deserialize, Serialize};

/// Decides which calendar days carry no trading for a market.
///
/// Weekends depend on the market category: currencies, commodities and bonds
/// have no Saturday session, exchange-traded markets are also closed on
/// Sunday, and crypto trades every day. Non-crypto markets are additionally
/// closed on 1 January, 25 December and any extra closures configured here.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HolidayCalendar {
    /// Additional full-day closures.
    closures: BTreeSet<NaiveDate>,
}

/// Month/day pairs closed every year.
const FIXED_CLOSURES: [(u32, u32); 2] = [(1, 1), (12, 25)];

impl HolidayCalendar {
    /// Creates a calendar with only the fixed yearly closures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a one-off closure.
    #[must_use]
    pub fn with_closure(mut self, date: NaiveDate) -> Self {
        self.closures.insert(date);
        self
    }

    /// Returns true if `date` falls on a weekend for the category.
    #[must_use]
    pub fn is_weekend(&self, date: NaiveDate, category: Category) -> bool {
        match category {
            Category::Crypto => false,
            Category::Forex | Category::Commodity | Category::Bond => {
                date.weekday() == Weekday::Sat
            }
            Category::Index | Category::Stock | Category::Etf => {
                matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
            }
        }
    }

    /// Returns true if `date` is a holiday closure for the category.
    #[must_use]
    pub fn is_holiday(&self, date: NaiveDate, category: Category) -> bool {
        if category == Category::Crypto {
            return false;
        }
        FIXED_CLOSURES.contains(&(date.month(), date.day())) || self.closures.contains(&date)
    }

    /// Returns true if no data is expected for `date`.
    #[must_use]
    pub fn is_non_trading(&self, date: NaiveDate, category: Category) -> bool {
        self.is_weekend(date, category) || self.is_holiday(date, category)
    }
}

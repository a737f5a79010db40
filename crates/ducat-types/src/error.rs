//! Validation errors for core types.

use chrono::NaiveDate;
use thiserror::Error;

/// Error for invalid date ranges.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateRangeError {
    /// Start date is after end date.
    #[error("Invalid date range: {start} > {end}")]
    InvalidRange {
        /// The start date.
        start: NaiveDate,
        /// The end date.
        end: NaiveDate,
    },
}

/// Error for malformed instrument symbols.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    /// The symbol was empty.
    #[error("Symbol must not be empty")]
    Empty,

    /// The symbol contained characters outside `[A-Z0-9]`.
    #[error("Invalid symbol format: {0}")]
    InvalidFormat(String),
}

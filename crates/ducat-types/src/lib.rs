//! Core types for the ducat historical price pipeline.
//!
//! This crate provides the fundamental data structures used throughout ducat:
//!
//! - [`Symbol`] - Validated instrument identifier
//! - [`DateRange`] / [`DayUnit`] - Inclusive date ranges and the per-day fetch unit
//! - [`Tick`] / [`RawTick`] - Fixed-point price updates and their bi5 wire form
//! - [`Candle`] / [`RawCandle`] - OHLCV buckets and the native candle wire form
//! - [`Record`] - A tick or candle flowing through validation and output
//! - [`Timeframe`] - Candle width on the epoch grid
//! - [`Instrument`] - Instrument metadata including price precision
//! - [`CancelFlag`] - Cooperative cancellation shared between workers

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ducat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod cancel;
mod candle;
mod day;
mod error;
mod instrument;
mod record;
mod symbol;
mod tick;
mod timeframe;

pub use cancel::CancelFlag;
pub use candle::{Candle, RawCandle};
pub use day::{DataSource, DateRange, DayIterator, DayUnit, PriceSide, day_start, hours_of};
pub use error::{DateRangeError, SymbolError};
pub use instrument::{Category, Instrument};
pub use record::{Record, RecordKind};
pub use symbol::Symbol;
pub use tick::{RawTick, Tick, VOLUME_MULTIPLIER};
pub use timeframe::{Timeframe, TimeframeParseError};

pub use rust_decimal::Decimal;

//! Instrument metadata and trading calendar for ducat.
//!
//! # Example
//!
//! ```
//! use ducat_instruments::{HolidayCalendar, InstrumentRegistry};
//! use ducat_types::Symbol;
//!
//! let registry = InstrumentRegistry::global();
//! let eurusd = registry.resolve(&Symbol::new("eurusd").unwrap());
//! assert_eq!(eurusd.price_scale(), 5);
//!
//! let calendar = HolidayCalendar::default();
//! let new_year = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//! assert!(calendar.is_non_trading(new_year, eurusd.category()));
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ducat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod calendar;
mod registry;

pub use calendar::HolidayCalendar;
pub use registry::{DEFAULT_DECIMAL_FACTOR, InstrumentRegistry};

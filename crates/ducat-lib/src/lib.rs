//! Resilient Dukascopy market data retrieval and streaming aggregation.
//!
//! This is a facade crate that re-exports functionality from the ducat
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ducat_lib::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
//!     let key = JobKey {
//!         symbol: Symbol::new("EURUSD")?,
//!         range: DateRange::single_day(day),
//!         timeframe: Timeframe::Minute1,
//!         source: DataSource::Ticks,
//!         price_side: PriceSide::Bid,
//!     };
//!
//!     let transport = Arc::new(DownloadClient::with_defaults()?);
//!     let store = Arc::new(FileCheckpointStore::with_default_path()?);
//!     let runner = JobRunner::new(JobRequest::new(key), transport, Arc::default(), store)
//!         .with_observer(Arc::new(ConsoleReporter));
//!
//!     let outcome = runner.run().await?;
//!     println!("wrote {} records to {}", outcome.records_written, outcome.output.display());
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ducat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use ducat_types::*;

// Re-export instrument registry and calendar
pub use ducat_instruments::{HolidayCalendar, InstrumentRegistry};

// Re-export fetch functionality
#[cfg(feature = "fetch")]
pub use ducat_fetch::{
    AttemptError, BreakerConfig, CircuitBreaker, CircuitState, ClientConfig, DayData, DayFetcher,
    DecompressError, DownloadClient, FailureKind, FetchError, ParseError, RetryConfig, Transport,
};

// Re-export aggregation and validation
#[cfg(feature = "aggregate")]
pub use ducat_aggregate::{
    Aggregator, Annotated, CarryState, DuplicatePolicy, ValidationStatus, Validator,
    ValidatorConfig, ValidatorState,
};

// Re-export formatters
#[cfg(feature = "format")]
pub use ducat_format::{
    CsvFormatter, FileSink, FormatError, Formatter, JsonFormatter, OutputFormat, OutputSink,
};

// Re-export job orchestration
#[cfg(feature = "jobs")]
pub use ducat_jobs::{
    ChannelReporter, Checkpoint, CheckpointError, CheckpointStore, ConsoleReporter, DaySummary,
    FileCheckpointStore, Frontier, JobConfig, JobError, JobId, JobKey, JobManager, JobOutcome,
    JobRequest, JobRunner, JobState, JobStatusReport, MemoryCheckpointStore, NullReporter,
    ProgressEvent, ProgressObserver,
};

/// Prelude module for convenient imports.
///
/// ```
/// use ducat_lib::prelude::*;
/// ```
pub mod prelude {
    pub use ducat_types::{
        CancelFlag, Candle, Category, DataSource, DateRange, DateRangeError, Instrument,
        PriceSide, Record, Symbol, Tick, Timeframe,
    };

    pub use ducat_instruments::{HolidayCalendar, InstrumentRegistry};

    #[cfg(feature = "fetch")]
    pub use ducat_fetch::{CircuitBreaker, ClientConfig, DayFetcher, DownloadClient, FetchError};

    #[cfg(feature = "aggregate")]
    pub use ducat_aggregate::{Aggregator, Validator, ValidatorConfig};

    #[cfg(feature = "format")]
    pub use ducat_format::{FileSink, OutputFormat, OutputSink};

    #[cfg(feature = "jobs")]
    pub use ducat_jobs::{
        ConsoleReporter, FileCheckpointStore, JobConfig, JobKey, JobManager, JobRequest,
        JobRunner, JobState,
    };
}

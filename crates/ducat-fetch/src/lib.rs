//! Resilient per-day retrieval for ducat.
//!
//! This crate provides the download side of the pipeline:
//!
//! - [`url::tick_url`] / [`url::candle_url`] - Datafeed URL construction
//! - [`Transport`] / [`DownloadClient`] - Single HTTP attempts over a pooled client
//! - [`decompress_bi5`] - LZMA decompression
//! - [`parse_ticks`] / [`parse_candles`] - Binary record parsing
//! - [`CircuitBreaker`] - Per-host failure gate shared across fetchers
//! - [`RetryConfig`] - Attempt budget with exponential backoff and jitter
//! - [`DayFetcher`] - Retrieves one day unit, skipping non-trading days

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ducat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod breaker;
mod client;
mod decompress;
mod error;
mod fetcher;
mod parse;
mod retry;
mod transport;
pub mod url;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState, HostStats};
pub use client::{ClientConfig, DownloadClient};
pub use decompress::{DecompressError, decompress_bi5};
pub use error::{AttemptError, FailureKind, FetchError};
pub use fetcher::{DEFAULT_HOUR_CONCURRENCY, DayData, DayFetcher};
pub use parse::{ParseError, parse_candles, parse_ticks};
pub use retry::RetryConfig;
pub use transport::Transport;

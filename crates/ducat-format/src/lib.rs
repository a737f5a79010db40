//! Output formatters and sinks for ducat.
//!
//! This crate writes the validated record stream to disk:
//!
//! - [`CsvFormatter`] - CSV format
//! - [`JsonFormatter`] - Newline-delimited JSON format
//! - [`FileSink`] - Append-only file output that can be truncated back to a
//!   committed length on resume

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ducat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod csv;
mod formatter;
mod json;
mod sink;

pub use crate::csv::CsvFormatter;
pub use formatter::{FormatError, Formatter, OutputFormat};
pub use json::JsonFormatter;
pub use sink::{FileSink, OutputSink};

//! Output format abstraction.

use ducat_types::{Record, RecordKind};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

use crate::{CsvFormatter, JsonFormatter};

/// Output format identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// CSV format.
    #[default]
    Csv,
    /// Newline-delimited JSON format.
    Ndjson,
}

impl OutputFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Ndjson => "ndjson",
        }
    }

    /// Returns all available formats.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Csv, Self::Ndjson]
    }

    /// Returns a formatter for this format.
    #[must_use]
    pub fn formatter(&self) -> Box<dyn Formatter> {
        match self {
            Self::Csv => Box::new(CsvFormatter::new()),
            Self::Ndjson => Box::new(JsonFormatter::new()),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "ndjson" | "jsonl" | "json" => Ok(Self::Ndjson),
            _ => Err(FormatError::UnknownFormat(s.to_string())),
        }
    }
}

/// Errors that can occur during formatting.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Unknown output format.
    #[error("Unknown format: {0}")]
    UnknownFormat(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The output file is shorter than the committed length being resumed from.
    #[error("{} holds {actual} bytes, expected at least {expected}", path.display())]
    Truncated {
        /// Output file.
        path: PathBuf,
        /// Committed length.
        expected: u64,
        /// Length found on disk.
        actual: u64,
    },
}

/// Writes records as rows.
///
/// Every row ends with a newline, so output stays valid when truncated
/// between rows.
pub trait Formatter: Send + Sync {
    /// Writes the header for a stream of `kind` records, if the format has one.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_header(&self, kind: RecordKind, writer: &mut dyn Write) -> Result<(), FormatError>;

    /// Writes one record.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_record(&self, record: &Record, writer: &mut dyn Write) -> Result<(), FormatError>;

    /// Returns the file extension for this format.
    fn extension(&self) -> &str;
}

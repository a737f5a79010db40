//! Job and checkpoint errors.

use std::path::PathBuf;

use ducat_fetch::FetchError;
use ducat_format::FormatError;
use ducat_types::DateRangeError;
use thiserror::Error;

use crate::JobId;

/// Errors from checkpoint persistence.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Failed to determine the application data directory.
    #[error("Failed to determine application data directory")]
    NoDataDir,

    /// A checkpoint exists but cannot be trusted.
    #[error("Checkpoint '{path}' is corrupt: {reason}")]
    Corrupt {
        /// The checkpoint file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },

    /// Failed to read a checkpoint.
    #[error("Failed to read checkpoint '{path}': {source}")]
    Read {
        /// The path that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to write a checkpoint.
    #[error("Failed to write checkpoint '{path}': {source}")]
    Write {
        /// The path that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to serialize a checkpoint.
    #[error("Failed to serialize checkpoint: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Conditions that end a job in the failed state.
#[derive(Error, Debug)]
pub enum JobError {
    /// The date range is empty or reversed.
    #[error("Invalid date range: {0}")]
    InvalidRange(#[from] DateRangeError),

    /// The job configuration cannot be run.
    #[error("Invalid job configuration: {0}")]
    InvalidConfig(String),

    /// The stored checkpoint cannot be resumed from.
    #[error("Cannot resume: {0}")]
    CheckpointCorrupt(String),

    /// Too many days in a row failed to download.
    #[error("{consecutive} consecutive days failed (limit {limit}), last error: {last}")]
    TooManyFailures {
        /// Consecutive failed days.
        consecutive: usize,
        /// The configured limit.
        limit: usize,
        /// The last day's error.
        last: FetchError,
    },

    /// Writing output failed.
    #[error("Output error: {0}")]
    Output(#[from] FormatError),

    /// Saving or loading a checkpoint failed.
    #[error(transparent)]
    Checkpoint(CheckpointError),

    /// No job with this id was submitted.
    #[error("Job not found: {0}")]
    UnknownJob(JobId),

    /// The job task panicked or was aborted.
    #[error("Job task failed: {0}")]
    Panicked(String),
}

impl From<CheckpointError> for JobError {
    fn from(error: CheckpointError) -> Self {
        match error {
            CheckpointError::Corrupt { path, reason } => {
                Self::CheckpointCorrupt(format!("{}: {reason}", path.display()))
            }
            other => Self::Checkpoint(other),
        }
    }
}

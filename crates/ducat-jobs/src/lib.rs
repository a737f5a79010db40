//! Job orchestration for ducat.
//!
//! - [`JobRunner`] runs one job: bounded parallel day fetches, an ordered
//!   reduce stage, periodic checkpoints and cancellation.
//! - [`JobManager`] runs many jobs that share one circuit breaker.
//! - [`CheckpointStore`] persists progress so interrupted jobs resume with
//!   output identical to an uninterrupted run.
//! - [`ProgressObserver`] receives state changes, per-day progress and
//!   validation diagnostics.

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ducat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod checkpoint;
mod config;
mod error;
mod job;
mod manager;
mod progress;
mod reorder;
mod runner;

pub use checkpoint::{
    Checkpoint, CheckpointStore, FileCheckpointStore, Frontier, MemoryCheckpointStore,
};
pub use config::JobConfig;
pub use error::{CheckpointError, JobError};
pub use job::{JobId, JobKey, JobOutcome, JobRequest, JobState, JobStatusReport};
pub use manager::JobManager;
pub use progress::{
    ChannelReporter, ConsoleReporter, DaySummary, NullReporter, ProgressEvent, ProgressObserver,
};
pub use runner::JobRunner;

//! Streaming aggregation and validation for ducat.
//!
//! This crate provides the sequential reduce stage of the pipeline:
//!
//! - [`Aggregator`] - Tick or minute-candle to candle aggregation on an epoch grid
//! - [`CarryState`] - The open bucket carried between day units
//! - [`Validator`] - Gap, duplicate and consistency annotation

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/ducat/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod aggregator;
mod validator;

pub use aggregator::{Aggregator, CarryState};
pub use validator::{
    Annotated, DuplicatePolicy, ValidationStatus, Validator, ValidatorConfig, ValidatorState,
};

//! phonotest-core — Trial model, response validation, and result aggregation.
//!
//! This crate defines the trial-set data model, the submission pipeline,
//! the response store trait, and the CSV reports that the rest of
//! phonotest builds on.

pub mod auth;
pub mod error;
pub mod experiment;
pub mod model;
pub mod parser;
pub mod registry;
pub mod report;
pub mod statistics;
pub mod traits;
pub mod validator;

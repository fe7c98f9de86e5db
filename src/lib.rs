//! # Crayfish Survey
//!
//! Turns the crayfish survey workbook into two tidy tables, keeps them in an
//! embedded DuckDB store and answers the aggregate questions the survey
//! dashboard asks.
//!
//! ## Pipeline
//!
//! - **Parse**: [`survey::raw::RawTableParser`] reads the two multi-level
//!   header sheets of an `.xlsx` workbook into `(Site, Method?, Info)` keyed
//!   columns
//! - **Normalize**: [`survey::normalize::TableNormalizer`] flattens them into
//!   [`survey::ObservationByMethod`] and [`survey::ObservationBySite`] rows,
//!   counting every dropped row
//! - **Store**: [`database::Repository`] replaces both tables atomically and
//!   offers validated CRUD and CSV export
//! - **Aggregate**: [`analysis::engine::AggregationEngine`] computes range
//!   counts, bounds, per-sex and per-method summaries, fitted distributions
//!   and the population trend
//!
//! [`service::SurveyService`] wires the pieces together from a
//! [`config::SurveyConfig`].

pub mod analysis;
pub mod config;
pub mod database;
pub mod error;
pub(crate) mod helpers;
pub mod service;
pub mod spreadsheet;
pub mod survey;

#[cfg(test)]
mod testing;

pub use crate::config::SurveyConfig;
pub use crate::error::ErrorKind;
pub use crate::error::SurveyError;
pub use crate::service::Dataset;
pub use crate::service::SurveyService;

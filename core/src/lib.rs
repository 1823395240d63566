//! Reshape-and-load pipeline for cohort-simulation parameter sheets.
//!
//! Sheets are read into `table::Table`, optionally merged and melted, bound
//! against the fixed `catalog`, and written by `loader` through
//! insert-select-join statements that resolve dimension labels in place.
//! `orchestrator` sequences the stages per table; `store` owns the
//! transaction that makes a run all-or-nothing.

pub mod catalog;
pub mod config;
pub mod dimension;
pub mod error;
pub mod loader;
pub mod merge;
pub mod orchestrator;
pub mod reshape;
pub mod store;
pub mod table;
pub mod types;

pub use config::IngestConfig;
pub use error::{IngestError, IngestResult};
pub use orchestrator::{ingest_input_tables, ingest_parameter_tables, RunReport, Stage, TableReport};
pub use store::IngestStore;
pub use types::{RunKind, VersionId};

use thiserror::Error;

use crate::{
    orchestrator::{Stage, TableReport},
    types::VersionId,
};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error in '{file}': {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("Source file '{file}' not found")]
    FileNotFound { file: String },

    #[error("Schema mismatch in '{file}': {detail}")]
    SchemaMismatch { file: String, detail: String },

    #[error("Invalid value {value:?} in '{file}' line {line}, column '{column}'")]
    InvalidValue {
        file: String,
        line: usize,
        column: String,
        value: String,
    },

    #[error(
        "Label resolution failed for table '{table}' ({file}): {failed_rows} row(s) did not \
         resolve to exactly one dimension match; first at line {line}: {detail}"
    )]
    LabelResolutionFailure {
        table: String,
        file: String,
        line: usize,
        detail: String,
        failed_rows: usize,
    },

    #[error(
        "Row count mismatch for table '{table}' ({file}): submitted {submitted}, affected {affected}"
    )]
    RowCountMismatch {
        table: String,
        file: String,
        submitted: usize,
        affected: usize,
    },

    #[error("Merge of '{file}' for table '{table}' dropped {dropped} row(s) with no counterpart")]
    MergeLoss {
        table: String,
        file: String,
        dropped: usize,
    },

    #[error("Version identifier must be positive, got {version}")]
    InvalidVersion { version: VersionId },

    #[error("Table '{table}' already holds {rows} row(s) for version {version}")]
    VersionAlreadyLoaded {
        table: String,
        version: VersionId,
        rows: i64,
    },

    #[error("Illegal stage transition for table '{table}': {from} -> {to}")]
    StageTransition {
        table: String,
        from: String,
        to: String,
    },

    /// A fault raised while one fact table was in flight. `report` is that
    /// table's final state (stage FAILED); `failed_at` is the last stage it
    /// reached before the fault.
    #[error("Table '{table}' ({file}) failed after {failed_at}: {source}")]
    TableFailed {
        table: String,
        file: String,
        failed_at: Stage,
        report: Box<TableReport>,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    /// The fault itself, looking through any table context.
    pub fn root_cause(&self) -> &IngestError {
        match self {
            IngestError::TableFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Report of the table that was in flight when the run failed, if any.
    pub fn failed_table(&self) -> Option<&TableReport> {
        match self {
            IngestError::TableFailed { report, .. } => Some(report.as_ref()),
            _ => None,
        }
    }
}

pub type IngestResult<T> = Result<T, IngestError>;

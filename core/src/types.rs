//! Shared primitive types used across the ingestion pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dataset generation tag (`input_set_id` / `parameter_set_id`).
pub type VersionId = i64;

/// 1-based line number in a source file, counting the header as line 1.
pub type SourceLine = usize;

/// Which family of source files a run ingests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Inputs,
    Parameters,
}

impl RunKind {
    /// Name of the version column every fact table of this family carries.
    pub fn version_column(self) -> &'static str {
        match self {
            RunKind::Inputs     => "input_set_id",
            RunKind::Parameters => "parameter_set_id",
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunKind::Inputs     => f.write_str("inputs"),
            RunKind::Parameters => f.write_str("parameters"),
        }
    }
}

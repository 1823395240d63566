//! In-memory tabular structure read from a delimited source file.
//!
//! Cells are kept as trimmed text. Typing happens at bind time, when the
//! fact catalog decides whether a column is a label, a year or a value.

use crate::{
    error::{IngestError, IngestResult},
    types::SourceLine,
};
use std::path::Path;

/// One source row. `line` is where it came from, for fault reports.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub line:  SourceLine,
    pub cells: Vec<String>,
}

impl Row {
    pub fn get(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    /// Source label (file name, or a join of file names after a merge).
    pub name: String,
    headers:  Vec<String>,
    rows:     Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Build a table from literal cells. Lines are numbered as if the
    /// header sat on line 1.
    pub fn from_rows(name: &str, headers: &[&str], rows: &[&[&str]]) -> IngestResult<Self> {
        let mut table = Self::new(name, headers.iter().map(|h| h.to_string()).collect());
        for (i, cells) in rows.iter().enumerate() {
            table.push_row(i + 2, cells.iter().map(|c| c.to_string()).collect())?;
        }
        Ok(table)
    }

    /// Read a headed CSV file. Spreadsheet index artefacts (blank or
    /// `Unnamed…` headers) are dropped.
    pub fn read_csv(path: &Path) -> IngestResult<Self> {
        let file = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if !path.is_file() {
            return Err(IngestError::FileNotFound {
                file: path.display().to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| IngestError::Csv { file: file.clone(), source })?;

        let raw_headers: Vec<String> = reader
            .headers()
            .map_err(|source| IngestError::Csv { file: file.clone(), source })?
            .iter()
            .map(str::to_string)
            .collect();

        let keep: Vec<usize> = raw_headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !is_index_artifact(h))
            .map(|(i, _)| i)
            .collect();

        let mut table = Self::new(
            file.clone(),
            keep.iter().map(|&i| raw_headers[i].clone()).collect(),
        );

        for result in reader.records() {
            let record = result.map_err(|source| csv_fault(&file, source))?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(table.rows.len() + 2);
            let cells = keep
                .iter()
                .map(|&i| record.get(i).unwrap_or("").to_string())
                .collect();
            table.push_row(line, cells)?;
        }

        log::debug!(
            "read {file}: {} column(s), {} row(s)",
            table.headers.len(),
            table.rows.len()
        );
        Ok(table)
    }

    pub fn push_row(&mut self, line: SourceLine, cells: Vec<String>) -> IngestResult<()> {
        if cells.len() != self.headers.len() {
            return Err(IngestError::SchemaMismatch {
                file:   self.name.clone(),
                detail: format!(
                    "line {line} has {} cell(s), header has {}",
                    cells.len(),
                    self.headers.len()
                ),
            });
        }
        self.rows.push(Row { line, cells });
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// First header matching any accepted name, in the order given.
    pub fn find_column(&self, accepted: &[&str]) -> Option<usize> {
        accepted.iter().find_map(|name| self.column_index(name))
    }

    pub fn require_column(&self, accepted: &[&str]) -> IngestResult<usize> {
        self.find_column(accepted)
            .ok_or_else(|| IngestError::SchemaMismatch {
                file:   self.name.clone(),
                detail: format!(
                    "expected one of columns [{}], found [{}]",
                    accepted.join(", "),
                    self.headers.join(", ")
                ),
            })
    }
}

fn is_index_artifact(header: &str) -> bool {
    header.is_empty() || header.starts_with("Unnamed")
}

fn csv_fault(file: &str, source: csv::Error) -> IngestError {
    if let csv::ErrorKind::UnequalLengths { pos, expected_len, len } = source.kind() {
        let line = pos.as_ref().map(|p| p.line()).unwrap_or(0);
        return IngestError::SchemaMismatch {
            file:   file.to_string(),
            detail: format!("line {line} has {len} cell(s), header has {expected_len}"),
        };
    }
    IngestError::Csv {
        file: file.to_string(),
        source,
    }
}

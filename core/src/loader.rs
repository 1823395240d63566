//! Fact loader: bind long-format rows to a catalog template and run the
//! insert-select-join once per row under the caller's transaction.
//!
//! RULE: the loader only appends. It never updates or deletes fact rows.
//! Each row's affected count is kept so rows that resolved to zero or
//! several dimension matches can be reported by line.

use crate::{
    catalog::{ColumnSource, FactSpec, FixedKey},
    config::IngestConfig,
    dimension::{display_value, Dimension, DimensionResolver, LabelKind},
    error::{IngestError, IngestResult},
    table::{Row, Table},
    types::{SourceLine, VersionId},
};
use rusqlite::{params_from_iter, types::Value, Connection};
use std::iter;

/// Parameters for one insert, in template placeholder order minus the
/// trailing version identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundRow {
    pub line:   SourceLine,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
enum CellKind {
    Real,
    Integer,
    Text,
}

#[derive(Debug, Clone)]
enum Slot {
    Cell { idx: usize, kind: CellKind },
    Const(Value),
}

/// Turn a (merged, melted) table into bound rows for `spec`.
///
/// Values are bound before labels, matching the template layout. A sheet
/// with no `year` column binds `config.default_year`.
pub fn bind_rows(spec: &FactSpec, table: &Table, config: &IngestConfig) -> IngestResult<Vec<BoundRow>> {
    let mut scalars = Vec::new();
    let mut labels = Vec::new();

    for column in spec.columns {
        match column.source {
            ColumnSource::Value { headers } => {
                let idx = table.require_column(headers)?;
                scalars.push(Slot::Cell { idx, kind: CellKind::Real });
            }
            ColumnSource::FixedKey(key) => {
                let id = match key {
                    FixedKey::EnteringIntervention => config.entering_cohort_intervention_id,
                    FixedKey::EnteringBehavior     => config.entering_cohort_behavior_id,
                };
                scalars.push(Slot::Const(Value::Integer(id)));
            }
            ColumnSource::Label { dimension, headers, .. } => {
                let kind = match dimension.label_kind() {
                    LabelKind::Integer => CellKind::Integer,
                    LabelKind::Text    => CellKind::Text,
                };
                let slot = match table.find_column(headers) {
                    Some(idx) => Slot::Cell { idx, kind },
                    None if dimension == Dimension::Year => {
                        Slot::Const(Value::Integer(config.default_year))
                    }
                    None => Slot::Cell { idx: table.require_column(headers)?, kind },
                };
                labels.push(slot);
            }
        }
    }

    let slots: Vec<Slot> = scalars.into_iter().chain(labels).collect();
    table
        .rows()
        .iter()
        .map(|row| {
            let params = slots
                .iter()
                .map(|slot| bind_slot(table, row, slot))
                .collect::<IngestResult<Vec<_>>>()?;
            Ok(BoundRow { line: row.line, params })
        })
        .collect()
}

fn bind_slot(table: &Table, row: &Row, slot: &Slot) -> IngestResult<Value> {
    let (idx, kind) = match slot {
        Slot::Const(v) => return Ok(v.clone()),
        Slot::Cell { idx, kind } => (*idx, *kind),
    };
    let raw = row.get(idx);
    let invalid = || IngestError::InvalidValue {
        file:   table.name.clone(),
        line:   row.line,
        column: table.headers()[idx].clone(),
        value:  raw.to_string(),
    };
    match kind {
        CellKind::Real => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Value::Real)
            .ok_or_else(invalid),
        CellKind::Integer => raw.parse::<i64>().map(Value::Integer).map_err(|_| invalid()),
        CellKind::Text => Ok(Value::Text(raw.to_string())),
    }
}

/// A bound row whose insert did not write exactly one fact row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFault {
    pub line:     SourceLine,
    pub affected: usize,
    pub detail:   String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub submitted:   usize,
    pub affected:    usize,
    /// Count of rows that did not write exactly one fact row.
    pub fault_rows:  usize,
    /// The first few of those rows, diagnosed.
    pub faults:      Vec<RowFault>,
}

impl LoadOutcome {
    /// The LOADED -> VERIFIED check: every row resolved, and the totals agree.
    pub fn verify(&self, table: &str, file: &str) -> IngestResult<()> {
        // Checked per row: a missing match and a duplicate match can cancel
        // out in the totals.
        if self.fault_rows > 0 {
            return Err(IngestError::LabelResolutionFailure {
                table:       table.to_string(),
                file:        file.to_string(),
                line:        self.faults.first().map(|f| f.line).unwrap_or(0),
                detail:      self
                    .faults
                    .iter()
                    .map(|f| format!("line {}: {}", f.line, f.detail))
                    .collect::<Vec<_>>()
                    .join("; "),
                failed_rows: self.fault_rows,
            });
        }
        if self.affected != self.submitted {
            return Err(IngestError::RowCountMismatch {
                table:     table.to_string(),
                file:      file.to_string(),
                submitted: self.submitted,
                affected:  self.affected,
            });
        }
        Ok(())
    }
}

pub struct FactLoader<'c> {
    conn:                &'c Connection,
    max_reported_faults: usize,
}

impl<'c> FactLoader<'c> {
    pub fn new(conn: &'c Connection, max_reported_faults: usize) -> Self {
        Self {
            conn,
            max_reported_faults,
        }
    }

    /// Execute `spec`'s template for every row, tagged with `version`.
    pub fn load(&self, spec: &FactSpec, rows: &[BoundRow], version: VersionId) -> IngestResult<LoadOutcome> {
        let sql = spec.insert_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let version = Value::Integer(version);
        let axes: Vec<Dimension> = spec.axes().iter().map(|a| a.dimension).collect();
        let label_offset = spec.scalar_count();

        let mut outcome = LoadOutcome {
            submitted:  rows.len(),
            affected:   0,
            fault_rows: 0,
            faults:     Vec::new(),
        };

        for row in rows {
            let affected = stmt.execute(params_from_iter(row.params.iter().chain(iter::once(&version))))?;
            outcome.affected += affected;
            if affected == 1 {
                continue;
            }
            outcome.fault_rows += 1;
            if outcome.faults.len() < self.max_reported_faults {
                let labels: Vec<(Dimension, &Value)> = axes
                    .iter()
                    .copied()
                    .zip(row.params[label_offset..].iter())
                    .collect();
                outcome.faults.push(RowFault {
                    line: row.line,
                    affected,
                    detail: self.explain(&labels, affected)?,
                });
            }
        }

        log::debug!(
            "{}: submitted {} row(s), affected {}",
            spec.table,
            outcome.submitted,
            outcome.affected
        );
        Ok(outcome)
    }

    fn explain(&self, labels: &[(Dimension, &Value)], affected: usize) -> IngestResult<String> {
        let faults = DimensionResolver::new(self.conn).diagnose(labels)?;
        if faults.is_empty() {
            let tuple: Vec<String> = labels
                .iter()
                .map(|(d, v)| format!("{d}={}", display_value(v)))
                .collect();
            return Ok(format!("join over [{}] wrote {affected} row(s)", tuple.join(", ")));
        }
        Ok(faults
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "))
    }
}

//! Dimension tables and label-to-key resolution.
//!
//! Dimensions are controlled vocabularies (`id`, `<label>`) that are
//! pre-populated and read-only during ingestion. Resolution normally happens
//! inside the fact insert itself (see `DimensionJoin`); the resolver here is
//! the standalone lookup used to explain rows the join failed to resolve.

use crate::error::IngestResult;
use rusqlite::{types::Value, Connection};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    AgeGroup,
    Race,
    Sex,
    Year,
    Intervention,
    Behavior,
}

/// How a label cell is bound when it reaches SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Text,
    Integer,
}

impl Dimension {
    pub fn table(self) -> &'static str {
        match self {
            Dimension::AgeGroup     => "age_group",
            Dimension::Race         => "race",
            Dimension::Sex          => "sex",
            Dimension::Year         => "years",
            Dimension::Intervention => "intervention",
            Dimension::Behavior     => "behavior",
        }
    }

    pub fn label_column(self) -> &'static str {
        match self {
            Dimension::Year => "year",
            other           => other.table(),
        }
    }

    pub fn label_kind(self) -> LabelKind {
        match self {
            Dimension::Year => LabelKind::Integer,
            _               => LabelKind::Text,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

/// One aliased dimension in an insert-select-join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Axis {
    pub alias:     &'static str,
    pub dimension: Dimension,
}

/// SQL fragments resolving several labels against their dimensions in a
/// single statement: `FROM d1 AS x, d2 AS y WHERE x.label = ?n AND …`.
///
/// A row whose labels all exist exactly once yields exactly one joined row.
/// Zero or duplicate matches change the yield, which the loader detects from
/// the affected-row count.
#[derive(Debug, Clone, Copy)]
pub struct DimensionJoin<'a> {
    axes: &'a [Axis],
}

impl<'a> DimensionJoin<'a> {
    pub fn new(axes: &'a [Axis]) -> Self {
        Self { axes }
    }

    pub fn key_expr(alias: &str) -> String {
        format!("{alias}.id")
    }

    pub fn from_clause(&self) -> String {
        self.axes
            .iter()
            .map(|a| format!("{} AS {}", a.dimension.table(), a.alias))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Equality predicates, one per axis, with placeholders numbered from
    /// `first_param` in axis order.
    pub fn where_clause(&self, first_param: usize) -> String {
        self.axes
            .iter()
            .enumerate()
            .map(|(i, a)| format!("{}.{} = ?{}", a.alias, a.dimension.label_column(), first_param + i))
            .collect::<Vec<_>>()
            .join(" AND ")
    }
}

/// A label that did not resolve to exactly one dimension row.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFault {
    pub dimension: Dimension,
    pub label:     String,
    pub matches:   usize,
}

impl fmt::Display for LabelFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.matches {
            0 => write!(f, "{} label {:?} not found", self.dimension, self.label),
            n => write!(f, "{} label {:?} is ambiguous ({n} matches)", self.dimension, self.label),
        }
    }
}

pub struct DimensionResolver<'c> {
    conn: &'c Connection,
}

impl<'c> DimensionResolver<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Every surrogate key carrying `label`, lowest first.
    pub fn lookup(&self, dimension: Dimension, label: &Value) -> IngestResult<Vec<i64>> {
        let sql = format!(
            "SELECT id FROM {} WHERE {} = ?1 ORDER BY id",
            dimension.table(),
            dimension.label_column()
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let ids = stmt
            .query_map([label], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// The single surrogate key for `label`, or the fault explaining why
    /// there is not exactly one.
    pub fn resolve(
        &self,
        dimension: Dimension,
        label: &Value,
    ) -> IngestResult<Result<i64, LabelFault>> {
        let ids = self.lookup(dimension, label)?;
        match ids.as_slice() {
            [id] => Ok(Ok(*id)),
            _ => Ok(Err(LabelFault {
                dimension,
                label: display_value(label),
                matches: ids.len(),
            })),
        }
    }

    /// Faults for every label in the tuple that does not resolve cleanly.
    pub fn diagnose(&self, labels: &[(Dimension, &Value)]) -> IngestResult<Vec<LabelFault>> {
        let mut faults = Vec::new();
        for (dimension, label) in labels {
            if let Err(fault) = self.resolve(*dimension, label)? {
                faults.push(fault);
            }
        }
        Ok(faults)
    }
}

/// Render a bound value the way it appeared in the source sheet.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null       => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r)    => r.to_string(),
        Value::Text(s)    => s.clone(),
        Value::Blob(b)    => format!("<{} bytes>", b.len()),
    }
}

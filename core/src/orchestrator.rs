//! The ingestion orchestrator.
//!
//! Every fact table of a run walks the same stages:
//!   PENDING -> MERGED -> RESHAPED -> LOADED -> VERIFIED
//! and drops to FAILED from any of them. A table with one source skips the
//! merge work but still passes through MERGED, and likewise for RESHAPED.
//!
//! RULES:
//!   - All tables of a run share the caller's transaction. Nothing here
//!     commits; a returned error means the caller must roll back.
//!   - Preparation (read, merge, melt, bind) runs for every table before
//!     the first write, so missing files and shape faults abort with the
//!     database untouched.
//!   - Tables are prepared and loaded in catalog order. Their targets are
//!     disjoint, so the order does not affect the result.

use crate::{
    catalog::{self, FactSpec},
    config::IngestConfig,
    error::{IngestError, IngestResult},
    loader::{bind_rows, BoundRow, FactLoader},
    merge::inner_join,
    reshape::{melt, MeltSpec},
    table::Table,
    types::{RunKind, VersionId},
};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use std::{fmt, path::Path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Pending,
    Merged,
    Reshaped,
    Loaded,
    Verified,
    Failed,
}

impl Stage {
    fn next(self) -> Option<Stage> {
        match self {
            Stage::Pending  => Some(Stage::Merged),
            Stage::Merged   => Some(Stage::Reshaped),
            Stage::Reshaped => Some(Stage::Loaded),
            Stage::Loaded   => Some(Stage::Verified),
            Stage::Verified | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending  => "PENDING",
            Stage::Merged   => "MERGED",
            Stage::Reshaped => "RESHAPED",
            Stage::Loaded   => "LOADED",
            Stage::Verified => "VERIFIED",
            Stage::Failed   => "FAILED",
        };
        f.write_str(s)
    }
}

/// Outcome of one fact table within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table:         String,
    pub sources:       Vec<String>,
    pub stage:         Stage,
    /// Rows read across all source sheets.
    pub source_rows:   usize,
    /// Rows dropped by the merge for lack of a counterpart.
    pub merge_dropped: usize,
    pub submitted:     usize,
    pub affected:      usize,
}

impl TableReport {
    fn new(spec: &FactSpec) -> Self {
        Self {
            table:         spec.table.to_string(),
            sources:       spec.sources.iter().map(|s| s.to_string()).collect(),
            stage:         Stage::Pending,
            source_rows:   0,
            merge_dropped: 0,
            submitted:     0,
            affected:      0,
        }
    }

    /// Move to `to`, which must be the next stage or FAILED.
    pub fn advance(&mut self, to: Stage) -> IngestResult<()> {
        let legal = match to {
            Stage::Failed => !self.stage.is_terminal(),
            _             => self.stage.next() == Some(to),
        };
        if !legal {
            return Err(IngestError::StageTransition {
                table: self.table.clone(),
                from:  self.stage.to_string(),
                to:    to.to_string(),
            });
        }
        log::debug!("{}: {} -> {}", self.table, self.stage, to);
        self.stage = to;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub kind:    RunKind,
    pub version: VersionId,
    pub tables:  Vec<TableReport>,
}

impl RunReport {
    pub fn rows_written(&self) -> usize {
        self.tables.iter().map(|t| t.affected).sum()
    }

    pub fn merge_dropped(&self) -> usize {
        self.tables.iter().map(|t| t.merge_dropped).sum()
    }
}

/// A table that has been read and shaped, waiting for its insert.
struct Prepared {
    spec:   FactSpec,
    report: TableReport,
    rows:   Vec<BoundRow>,
}

pub struct Ingestor<'c> {
    conn:   &'c Connection,
    config: &'c IngestConfig,
}

impl<'c> Ingestor<'c> {
    pub fn new(conn: &'c Connection, config: &'c IngestConfig) -> Self {
        Self { conn, config }
    }

    /// Load every table of `kind` from `source_dir`, tagged with `version`.
    pub fn ingest(&self, kind: RunKind, source_dir: &Path, version: VersionId) -> IngestResult<RunReport> {
        if version <= 0 {
            return Err(IngestError::InvalidVersion { version });
        }
        log::info!("ingesting {kind} from {} as version {version}", source_dir.display());

        let specs = catalog::tables_for(kind);
        let mut prepared = Vec::with_capacity(specs.len());
        for spec in specs {
            prepared.push(self.prepare(spec, source_dir, version)?);
        }

        let mut tables = Vec::with_capacity(prepared.len());
        for item in prepared {
            tables.push(self.load(item, version)?);
        }

        let report = RunReport { kind, version, tables };
        log::info!(
            "{kind} version {version}: {} row(s) written across {} table(s)",
            report.rows_written(),
            report.tables.len()
        );
        Ok(report)
    }

    fn prepare(&self, spec: &FactSpec, source_dir: &Path, version: VersionId) -> IngestResult<Prepared> {
        let mut report = TableReport::new(spec);
        match self.shape(spec, source_dir, version, &mut report) {
            Ok(rows) => Ok(Prepared { spec: *spec, report, rows }),
            Err(e) => Err(fail(report, e)),
        }
    }

    /// PENDING -> MERGED -> RESHAPED, ending with bound rows.
    fn shape(
        &self,
        spec: &FactSpec,
        source_dir: &Path,
        version: VersionId,
        report: &mut TableReport,
    ) -> IngestResult<Vec<BoundRow>> {
        let existing = existing_rows(self.conn, spec, version)?;
        if existing > 0 {
            return Err(IngestError::VersionAlreadyLoaded {
                table: spec.table.to_string(),
                version,
                rows: existing,
            });
        }

        let mut sheets = Vec::with_capacity(spec.sources.len());
        for file in spec.sources {
            sheets.push(Table::read_csv(&source_dir.join(file))?);
        }
        report.source_rows = sheets.iter().map(Table::len).sum();

        let mut sheets = sheets.into_iter();
        let mut table = sheets.next().ok_or_else(|| IngestError::SchemaMismatch {
            file:   spec.table.to_string(),
            detail: "catalog entry names no source sheet".to_string(),
        })?;
        for other in sheets {
            let merged = inner_join(&table, &other)?;
            report.merge_dropped += merged.dropped();
            if merged.dropped() > 0 && self.config.fail_on_merge_loss {
                return Err(IngestError::MergeLoss {
                    table:   spec.table.to_string(),
                    file:    merged.table.name.clone(),
                    dropped: merged.dropped(),
                });
            }
            table = merged.table;
        }
        report.advance(Stage::Merged)?;

        if let Some(plan) = spec.melt {
            let ids = spec.melt_id_columns(&table);
            table = melt(
                &table,
                &MeltSpec {
                    id_columns: &ids,
                    var_name:   plan.var_name,
                    value_name: plan.value_name,
                    suffix:     &self.config.transition_suffix,
                },
            )?;
        }
        report.advance(Stage::Reshaped)?;

        let rows = bind_rows(spec, &table, self.config)?;
        report.submitted = rows.len();
        Ok(rows)
    }

    /// RESHAPED -> LOADED -> VERIFIED.
    fn load(&self, item: Prepared, version: VersionId) -> IngestResult<TableReport> {
        let Prepared { spec, mut report, rows } = item;
        let loader = FactLoader::new(self.conn, self.config.max_reported_faults);

        let result = loader.load(&spec, &rows, version).and_then(|outcome| {
            report.affected = outcome.affected;
            report.advance(Stage::Loaded)?;
            outcome.verify(spec.table, &report.sources.join("+"))?;
            report.advance(Stage::Verified)
        });
        if let Err(e) = result {
            return Err(fail(report, e));
        }

        log::info!(
            "{}: loaded {} row(s) from {} source row(s){}",
            report.table,
            report.affected,
            report.source_rows,
            if report.merge_dropped > 0 {
                format!(", {} dropped at merge", report.merge_dropped)
            } else {
                String::new()
            }
        );
        Ok(report)
    }
}

/// Move `report` to FAILED and wrap `cause` with the table's context.
fn fail(mut report: TableReport, cause: IngestError) -> IngestError {
    let failed_at = report.stage;
    log::warn!("{}: {failed_at} -> FAILED: {cause}", report.table);
    // Only open stages get here: VERIFIED is the last step of a load.
    if let Err(illegal) = report.advance(Stage::Failed) {
        log::error!("{illegal}");
    }
    IngestError::TableFailed {
        table:     report.table.clone(),
        file:      report.sources.join("+"),
        failed_at,
        report:    Box::new(report),
        source:    Box::new(cause),
    }
}

/// Rows `spec`'s table already holds under `version`.
pub fn existing_rows(conn: &Connection, spec: &FactSpec, version: VersionId) -> IngestResult<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {} = ?1",
        spec.table,
        spec.version_column()
    );
    Ok(conn.query_row(&sql, [version], |row| row.get(0))?)
}

/// Ingest the input tables (mortality, cohorts, costs, utilities, SMR).
pub fn ingest_input_tables(
    tx: &Transaction<'_>,
    source_dir: &Path,
    version: VersionId,
    config: &IngestConfig,
) -> IngestResult<RunReport> {
    Ingestor::new(tx, config).ingest(RunKind::Inputs, source_dir, version)
}

/// Ingest the parameter tables (overdose and transition probabilities).
pub fn ingest_parameter_tables(
    tx: &Transaction<'_>,
    source_dir: &Path,
    version: VersionId,
    config: &IngestConfig,
) -> IngestResult<RunReport> {
    Ingestor::new(tx, config).ingest(RunKind::Parameters, source_dir, version)
}

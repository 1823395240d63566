//! SQLite handle for the cohort-simulation database.
//!
//! RULE: a run opens exactly one transaction and either commits every table
//! it touched or none of them. Dropping the transaction on any error path
//! rolls it back.

use crate::{
    config::IngestConfig,
    dimension::Dimension,
    error::IngestResult,
    orchestrator::{Ingestor, RunReport},
    types::{RunKind, VersionId},
};
use rusqlite::{types::Value, Connection, Transaction};
use std::path::Path;

pub struct IngestStore {
    conn: Connection,
}

impl IngestStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> IngestResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> IngestResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Create the dimension and fact tables if they do not exist yet.
    /// Production databases already carry this schema.
    pub fn migrate(&self) -> IngestResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_dimensions.sql"))?;
        self.conn.execute_batch(include_str!("../../migrations/002_facts.sql"))?;
        Ok(())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open a transaction for callers driving `ingest_input_tables` /
    /// `ingest_parameter_tables` themselves.
    pub fn transaction(&mut self) -> IngestResult<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Run each kind in order inside one transaction and commit only if all
    /// of them verify.
    pub fn ingest(
        &mut self,
        kinds: &[RunKind],
        source_dir: &Path,
        version: VersionId,
        config: &IngestConfig,
    ) -> IngestResult<Vec<RunReport>> {
        let tx = self.conn.transaction()?;
        let mut reports = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let result = Ingestor::new(&tx, config).ingest(*kind, source_dir, version);
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    log::warn!("rolling back version {version}: {e}");
                    if let Err(rollback) = tx.rollback() {
                        log::error!("rollback of version {version} failed: {rollback}");
                    }
                    return Err(e);
                }
            }
        }
        tx.commit()?;
        log::info!("committed version {version}");
        Ok(reports)
    }

    // ── Dimensions ─────────────────────────────────────────────

    pub fn insert_dimension(&self, dimension: Dimension, id: i64, label: Value) -> IngestResult<()> {
        let sql = format!(
            "INSERT INTO {} (id, {}) VALUES (?1, ?2)",
            dimension.table(),
            dimension.label_column()
        );
        self.conn.execute(&sql, rusqlite::params![id, label])?;
        Ok(())
    }

    // ── Facts ──────────────────────────────────────────────────

    /// Rows `table` holds under `version` in `version_column`.
    pub fn fact_count(&self, table: &str, version_column: &str, version: VersionId) -> IngestResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE {version_column} = ?1");
        Ok(self.conn.query_row(&sql, [version], |row| row.get(0))?)
    }

    /// Every row of `table`, all columns, in rowid order. Used by tooling
    /// and tests to inspect what a run wrote.
    pub fn fact_rows(&self, table: &str) -> IngestResult<Vec<Vec<Value>>> {
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM {table} ORDER BY rowid"))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map([], |row| {
                (0..width).map(|i| row.get::<_, Value>(i)).collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

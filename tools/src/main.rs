//! ingest-runner: load a directory of parameter sheets into the cohort
//! simulation database under one version identifier.
//!
//! Usage:
//!   ingest-runner --source-dir ./input1002 --db data.db --set-id 2 --kind parameters
//!   ingest-runner --source-dir ./input1002 --db data.db --set-id 2 --kind all --json

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cohort_ingest_core::{IngestConfig, IngestStore, RunKind, RunReport};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Inputs,
    Parameters,
    All,
}

impl KindArg {
    fn kinds(self) -> &'static [RunKind] {
        match self {
            KindArg::Inputs     => &[RunKind::Inputs],
            KindArg::Parameters => &[RunKind::Parameters],
            KindArg::All        => &[RunKind::Inputs, RunKind::Parameters],
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ingest-runner", about = "Loads parameter sheets into the simulation database")]
struct Args {
    /// Directory holding the source CSV files
    #[arg(long)]
    source_dir: PathBuf,

    /// SQLite database to write into
    #[arg(long)]
    db: PathBuf,

    /// Version identifier (input_set_id / parameter_set_id) for this run
    #[arg(long)]
    set_id: i64,

    /// Which family of tables to load
    #[arg(long, value_enum, default_value = "parameters")]
    kind: KindArg,

    /// Optional JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Create the dimension and fact tables first if they are missing
    #[arg(long, default_value = "false")]
    init_schema: bool,

    /// Print the run report as JSON
    #[arg(long, default_value = "false")]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => IngestConfig::load(path)?,
        None => IngestConfig::default(),
    };

    let mut store = IngestStore::open(&args.db)
        .with_context(|| format!("Failed to open database {}", args.db.display()))?;
    if args.init_schema {
        store.migrate().context("Failed to create schema")?;
    }

    let reports = store
        .ingest(args.kind.kinds(), &args.source_dir, args.set_id, &config)
        .with_context(|| {
            format!(
                "Ingestion of {} failed; no rows were committed",
                args.source_dir.display()
            )
        })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_summary(report);
        }
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("=== {} (version {}) ===", report.kind, report.version);
    for t in &report.tables {
        println!(
            "  {:<48} {:>8} row(s)  [{}]",
            t.table, t.affected, t.stage
        );
        if t.merge_dropped > 0 {
            println!("    merge dropped {} unmatched row(s)", t.merge_dropped);
        }
    }
    println!("  total: {} row(s)", report.rows_written());
    println!();
}

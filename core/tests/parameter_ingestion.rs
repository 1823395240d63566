//! Integration tests for the parameter-table entry point.
//!
//! 1. A wide transition row reshapes into one fact row per destination
//! 2. Overdose sheets merge before loading and the merge loss is reported
//! 3. Merge loss can be made fatal through configuration
//! 4. Ambiguous dimension labels are caught, not written twice
//! 5. A malformed wide sheet aborts before any write

mod common;

use cohort_ingest_core::{IngestConfig, IngestError, RunKind};
use common::*;
use rusqlite::types::Value;

fn probability_rows(store: &cohort_ingest_core::IngestStore, table: &str) -> Vec<Vec<Value>> {
    store.fact_rows(table).expect("rows")
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: behavior transition scenario
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn wide_behavior_row_becomes_one_row_per_end_behavior() {
    let mut store = seeded_store();
    let dir = parameter_dir();

    store
        .ingest(&[RunKind::Parameters], dir.path(), 1, &IngestConfig::default())
        .expect("ingest");

    let rows = probability_rows(&store, "behavior_transitions");
    let common_prefix = vec![
        Value::Integer(NONE),
        Value::Integer(ACTIVE),
        Value::Integer(AGE_26_35),
        Value::Integer(BLACK),
        Value::Integer(MALE),
        Value::Integer(YEAR_2015),
    ];
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(&row[..6], common_prefix.as_slice());
        assert_eq!(row[8], Value::Integer(1));
    }
    assert_eq!(&rows[0][6..8], &[Value::Integer(ABSTINENT), Value::Real(0.10)]);
    assert_eq!(&rows[1][6..8], &[Value::Integer(ACTIVE), Value::Real(0.90)]);
}

#[test]
fn intervention_transitions_ignore_the_spreadsheet_index_column() {
    let mut store = seeded_store();
    let dir = parameter_dir();

    store
        .ingest(&[RunKind::Parameters], dir.path(), 1, &IngestConfig::default())
        .expect("ingest");

    let rows = probability_rows(&store, "intervention_transitions");
    let ends: Vec<(Value, Value)> = rows.iter().map(|r| (r[6].clone(), r[7].clone())).collect();
    assert_eq!(
        ends,
        vec![
            (Value::Integer(NONE), Value::Real(0.8)),
            (Value::Integer(BUPRENORPHINE), Value::Real(0.2)),
        ]
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: merged overdose sheets
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn overdose_sheets_merge_and_report_dropped_rows() {
    let mut store = seeded_store();
    let dir = parameter_dir();

    let reports = store
        .ingest(&[RunKind::Parameters], dir.path(), 3, &IngestConfig::default())
        .expect("ingest");
    let report = &reports[0];

    assert_eq!(report.rows_written(), PARAMETER_ROWS);
    let overdoses = &report.tables[0];
    assert_eq!(overdoses.table, "overdoses");
    assert_eq!(overdoses.source_rows, 5);
    assert_eq!(overdoses.merge_dropped, 1);
    assert_eq!(overdoses.affected, 2);
    assert_eq!(report.merge_dropped(), 1);

    let rows = probability_rows(&store, "overdoses");
    assert_eq!(rows[1][6], Value::Real(0.02));
    assert_eq!(rows[1][7], Value::Real(0.2));
    assert_eq!(rows[1][8], Value::Integer(3));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: fatal merge loss
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn merge_loss_is_fatal_when_configured() {
    let mut store = seeded_store();
    let dir = parameter_dir();
    let config = IngestConfig {
        fail_on_merge_loss: true,
        ..IngestConfig::default()
    };

    let err = store
        .ingest(&[RunKind::Parameters], dir.path(), 1, &config)
        .unwrap_err();
    match err.root_cause() {
        IngestError::MergeLoss { table, dropped, .. } => {
            assert_eq!(table, "overdoses");
            assert_eq!(*dropped, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(total_rows(&store, &PARAMETER_TABLES), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: ambiguous labels
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn duplicate_dimension_label_is_a_resolution_failure() {
    let mut store = seeded_store();
    store
        .conn()
        .execute_batch(
            "DROP INDEX ux_behavior_label;
             INSERT INTO behavior (id, behavior) VALUES (99, 'abstinent');",
        )
        .expect("duplicate label");
    let dir = parameter_dir();

    let err = store
        .ingest(&[RunKind::Parameters], dir.path(), 1, &IngestConfig::default())
        .unwrap_err();

    match err.root_cause() {
        IngestError::LabelResolutionFailure { table, detail, .. } => {
            assert_eq!(table, "behavior_transition_after_intervention_change");
            assert!(detail.contains("ambiguous (2 matches)"), "{detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(total_rows(&store, &PARAMETER_TABLES), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: malformed wide sheet
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn wide_column_without_suffix_aborts_before_writing() {
    let mut store = seeded_store();
    let dir = parameter_dir();
    write(
        dir.path(),
        "oud_trans.csv",
        "intervention,initial_oud,agegrp,race,sex,abstinent_prob,active\n\
         none,active,26-35,black,male,0.10,0.90\n",
    );

    let err = store
        .ingest(&[RunKind::Parameters], dir.path(), 1, &IngestConfig::default())
        .unwrap_err();
    match err.root_cause() {
        IngestError::SchemaMismatch { file, detail } => {
            assert_eq!(file, "oud_trans.csv");
            assert!(detail.contains("'active'"), "{detail}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(total_rows(&store, &PARAMETER_TABLES), 0);
}

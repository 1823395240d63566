//! Shared fixtures: a migrated in-memory store with seeded dimensions, and
//! a temp directory holding a complete set of source sheets.

#![allow(dead_code)]

use cohort_ingest_core::{dimension::Dimension, IngestStore};
use rusqlite::types::Value;
use std::path::Path;
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Dimension ids used by the fixtures below.
pub const AGE_18_25: i64 = 1;
pub const AGE_26_35: i64 = 2;
pub const WHITE: i64 = 1;
pub const BLACK: i64 = 2;
pub const MALE: i64 = 1;
pub const FEMALE: i64 = 2;
pub const YEAR_2015: i64 = 1;
pub const NONE: i64 = 1;
pub const BUPRENORPHINE: i64 = 2;
pub const ACTIVE: i64 = 1;
pub const ABSTINENT: i64 = 2;

pub fn seeded_store() -> IngestStore {
    init_logging();
    let store = IngestStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");

    let text = |s: &str| Value::Text(s.to_string());
    let seeds: Vec<(Dimension, i64, Value)> = vec![
        (Dimension::AgeGroup, AGE_18_25, text("18-25")),
        (Dimension::AgeGroup, AGE_26_35, text("26-35")),
        (Dimension::Race, WHITE, text("white")),
        (Dimension::Race, BLACK, text("black")),
        (Dimension::Sex, MALE, text("male")),
        (Dimension::Sex, FEMALE, text("female")),
        (Dimension::Year, YEAR_2015, Value::Integer(2015)),
        (Dimension::Year, 2, Value::Integer(2016)),
        (Dimension::Intervention, NONE, text("none")),
        (Dimension::Intervention, BUPRENORPHINE, text("buprenorphine")),
        (Dimension::Behavior, ACTIVE, text("active")),
        (Dimension::Behavior, ABSTINENT, text("abstinent")),
    ];
    for (dimension, id, label) in seeds {
        store.insert_dimension(dimension, id, label).expect("seed dimension");
    }
    store
}

pub fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).expect("write fixture");
}

/// Input sheets: 2 + 1 + 2 + 1 + 1 + 1 = 8 fact rows.
pub const INPUT_ROWS: usize = 8;

pub fn input_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let p = dir.path();
    write(
        p,
        "background_mortality.csv",
        "age_group,race,sex,year,death_probability\n\
         18-25,white,female,2015,0.0021\n\
         26-35,black,male,2015,0.0030\n",
    );
    write(
        p,
        "entering_cohort.csv",
        "agegrp,race,sex,cohort_size_change_1_52\n\
         18-25,white,male,3.5\n",
    );
    write(
        p,
        "healthcare_utilization_cost.csv",
        "block,oud,agegrp,race,sex,healthcare_system\n\
         none,active,18-25,white,male,120.5\n\
         buprenorphine,abstinent,26-35,black,female,80\n",
    );
    write(
        p,
        "init_cohort.csv",
        "block,oud,agegrp,race,sex,counts\n\
         none,active,18-25,white,male,1000\n",
    );
    write(
        p,
        "utility.csv",
        "block,agegrp,race,sex,background,setting\n\
         none,18-25,white,male,0.9,0.8\n",
    );
    write(
        p,
        "SMR.csv",
        "block,oud,agegrp,race,sex,SMR\n\
         none,active,18-25,white,male,5.2\n",
    );
    dir
}

/// Parameter sheets: 2 (merged) + 2 + 2 (melted) + 2 (melted) = 8 fact rows.
pub const PARAMETER_ROWS: usize = 8;

pub fn parameter_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let p = dir.path();
    write(
        p,
        "all_types_overdose.csv",
        "intervention,oud,agegrp,race,sex,overdose_1_52\n\
         none,active,18-25,white,male,0.01\n\
         none,active,26-35,black,female,0.02\n\
         none,abstinent,18-25,white,male,0.005\n",
    );
    write(
        p,
        "fatal_overdose.csv",
        "agegrp,race,sex,oud,intervention,percent_overdoses_fatal_1_52\n\
         18-25,white,male,active,none,0.1\n\
         26-35,black,female,active,none,0.2\n",
    );
    write(
        p,
        "block_init_effectv2.csv",
        "initial_oud_state,to_intervention,retention_rate\n\
         active,buprenorphine,0.7\n\
         abstinent,buprenorphine,0.9\n",
    );
    write(
        p,
        "block_trans.csv",
        ",agegrp,race,sex,oud,initial_intervention,none_prob,buprenorphine_prob\n\
         0,18-25,white,male,active,none,0.8,0.2\n",
    );
    write(
        p,
        "oud_trans.csv",
        "intervention,initial_oud,agegrp,race,sex,abstinent_prob,active_prob\n\
         none,active,26-35,black,male,0.10,0.90\n",
    );
    dir
}

pub const INPUT_TABLES: [&str; 6] = [
    "background_mortality",
    "entering_cohort",
    "cost",
    "init_cohort",
    "utility",
    "smr",
];

pub const PARAMETER_TABLES: [&str; 4] = [
    "overdoses",
    "behavior_transition_after_intervention_change",
    "intervention_transitions",
    "behavior_transitions",
];

pub fn total_rows(store: &IngestStore, tables: &[&str]) -> i64 {
    tables
        .iter()
        .map(|t| {
            store
                .conn()
                .query_row(&format!("SELECT COUNT(*) FROM {t}"), [], |row| row.get::<_, i64>(0))
                .expect("count")
        })
        .sum()
}

//! Multi-source merge: natural inner join of two sheets on their shared
//! columns.
//!
//! Rows whose key tuple has no counterpart are dropped and counted. The
//! caller decides whether that loss is fatal; it is never silent.

use crate::{
    error::{IngestError, IngestResult},
    table::Table,
};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table:         Table,
    /// Key columns the join matched on, in left-hand order.
    pub keys:          Vec<String>,
    pub dropped_left:  usize,
    pub dropped_right: usize,
}

impl MergeOutcome {
    pub fn dropped(&self) -> usize {
        self.dropped_left + self.dropped_right
    }
}

/// Join `left` and `right` on every column they share.
///
/// Each key tuple must be unique within its own sheet, so the output holds
/// exactly one row per key tuple common to both inputs.
pub fn inner_join(left: &Table, right: &Table) -> IngestResult<MergeOutcome> {
    let merged_name = format!("{}+{}", left.name, right.name);

    let keys: Vec<String> = left
        .headers()
        .iter()
        .filter(|h| right.column_index(h).is_some())
        .cloned()
        .collect();
    if keys.is_empty() {
        return Err(IngestError::SchemaMismatch {
            file:   merged_name,
            detail: "sheets share no columns to merge on".to_string(),
        });
    }

    let left_keys = key_indices(left, &keys);
    let right_keys = key_indices(right, &keys);
    let right_extra: Vec<usize> = (0..right.headers().len())
        .filter(|i| !right_keys.contains(i))
        .collect();

    let mut right_index: HashMap<Vec<&str>, usize> = HashMap::with_capacity(right.len());
    for (pos, row) in right.rows().iter().enumerate() {
        let key: Vec<&str> = right_keys.iter().map(|&i| row.get(i)).collect();
        if right_index.insert(key, pos).is_some() {
            return Err(duplicate_key(right, row.line, &keys));
        }
    }

    let mut headers: Vec<String> = left.headers().to_vec();
    headers.extend(right_extra.iter().map(|&i| right.headers()[i].clone()));
    let mut out = Table::new(merged_name, headers);

    let mut seen_left: HashSet<Vec<&str>> = HashSet::with_capacity(left.len());
    let mut matched_right = 0usize;
    let mut dropped_left = 0usize;

    for row in left.rows() {
        let key: Vec<&str> = left_keys.iter().map(|&i| row.get(i)).collect();
        if !seen_left.insert(key.clone()) {
            return Err(duplicate_key(left, row.line, &keys));
        }
        match right_index.get(&key) {
            Some(&pos) => {
                let partner = &right.rows()[pos];
                let mut cells = row.cells.clone();
                cells.extend(right_extra.iter().map(|&i| partner.get(i).to_string()));
                out.push_row(row.line, cells)?;
                matched_right += 1;
            }
            None => dropped_left += 1,
        }
    }

    let dropped_right = right.len() - matched_right;
    if dropped_left + dropped_right > 0 {
        log::warn!(
            "merge {}: dropped {dropped_left} unmatched row(s) from {} and {dropped_right} from {}",
            out.name,
            left.name,
            right.name
        );
    }

    Ok(MergeOutcome {
        table: out,
        keys,
        dropped_left,
        dropped_right,
    })
}

fn key_indices(table: &Table, keys: &[String]) -> Vec<usize> {
    keys.iter().filter_map(|k| table.column_index(k)).collect()
}

fn duplicate_key(table: &Table, line: usize, keys: &[String]) -> IngestError {
    IngestError::SchemaMismatch {
        file:   table.name.clone(),
        detail: format!("line {line} repeats a key tuple over [{}]", keys.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incidence() -> Table {
        Table::from_rows(
            "all_types_overdose.csv",
            &["intervention", "oud", "agegrp", "overdose_1_52"],
            &[
                &["none", "active", "18-25", "0.010"],
                &["none", "active", "26-35", "0.020"],
                &["none", "nonactive", "18-25", "0.005"],
            ],
        )
        .expect("fixture")
    }

    fn fatality() -> Table {
        Table::from_rows(
            "fatal_overdose.csv",
            &["agegrp", "oud", "intervention", "percent_overdoses_fatal_1_52"],
            &[
                &["18-25", "active", "none", "0.10"],
                &["26-35", "active", "none", "0.20"],
                &["36-45", "active", "none", "0.30"],
            ],
        )
        .expect("fixture")
    }

    #[test]
    fn joins_on_shared_columns_regardless_of_order() {
        let outcome = inner_join(&incidence(), &fatality()).expect("merge");

        assert_eq!(outcome.keys, vec!["intervention", "oud", "agegrp"]);
        assert_eq!(
            outcome.table.headers(),
            &["intervention", "oud", "agegrp", "overdose_1_52", "percent_overdoses_fatal_1_52"]
        );
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(
            outcome.table.rows()[1].cells,
            vec!["none", "active", "26-35", "0.020", "0.20"]
        );
    }

    #[test]
    fn cardinality_equals_common_key_tuples_and_loss_is_counted() {
        let outcome = inner_join(&incidence(), &fatality()).expect("merge");

        // Common: (none, active, 18-25) and (none, active, 26-35).
        assert_eq!(outcome.table.len(), 2);
        assert_eq!(outcome.dropped_left, 1);
        assert_eq!(outcome.dropped_right, 1);
        assert_eq!(outcome.dropped(), 2);
    }

    #[test]
    fn perfect_match_drops_nothing() {
        let left = Table::from_rows("a.csv", &["k", "x"], &[&["1", "a"], &["2", "b"]]).expect("a");
        let right = Table::from_rows("b.csv", &["k", "y"], &[&["2", "B"], &["1", "A"]]).expect("b");
        let outcome = inner_join(&left, &right).expect("merge");

        assert_eq!(outcome.dropped(), 0);
        assert_eq!(outcome.table.rows()[0].cells, vec!["1", "a", "A"]);
        assert_eq!(outcome.table.rows()[1].cells, vec!["2", "b", "B"]);
    }

    #[test]
    fn duplicate_key_tuple_is_rejected() {
        let left = Table::from_rows("a.csv", &["k", "x"], &[&["1", "a"], &["1", "b"]]).expect("a");
        let right = Table::from_rows("b.csv", &["k", "y"], &[&["1", "A"]]).expect("b");
        let err = inner_join(&left, &right).unwrap_err();
        assert!(matches!(err, IngestError::SchemaMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn disjoint_headers_are_rejected() {
        let left = Table::from_rows("a.csv", &["k"], &[]).expect("a");
        let right = Table::from_rows("b.csv", &["j"], &[]).expect("b");
        assert!(inner_join(&left, &right).is_err());
    }
}

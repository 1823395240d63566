//! Wide-to-long reshape ("melt").
//!
//! A wide sheet carries one value column per destination category, named
//! `<category><suffix>`. Melting keeps the identifying columns and emits one
//! row per (source row, value column), recovering the category label by
//! stripping the suffix from the column name.
//!
//! RULE: the reshape never drops, deduplicates or reorders values within a
//! source row. R input rows with N value columns produce exactly R·N rows.

use crate::{
    error::{IngestError, IngestResult},
    table::Table,
};

/// Parameters of one melt.
#[derive(Debug, Clone, Copy)]
pub struct MeltSpec<'a> {
    /// Columns copied onto every output row. All other columns are values.
    pub id_columns: &'a [&'a str],
    /// Header of the output column holding the recovered category label.
    pub var_name:   &'a str,
    /// Header of the output column holding the cell value.
    pub value_name: &'a str,
    /// Trailing token stripped from each value column's name.
    pub suffix:     &'a str,
}

pub fn melt(table: &Table, spec: &MeltSpec<'_>) -> IngestResult<Table> {
    let schema_fault = |detail: String| IngestError::SchemaMismatch {
        file: table.name.clone(),
        detail,
    };

    let mut id_idx = Vec::with_capacity(spec.id_columns.len());
    for name in spec.id_columns {
        let idx = table
            .column_index(name)
            .ok_or_else(|| schema_fault(format!("melt identifying column '{name}' is missing")))?;
        id_idx.push(idx);
    }

    let mut value_cols: Vec<(usize, String)> = Vec::new();
    for (idx, header) in table.headers().iter().enumerate() {
        if id_idx.contains(&idx) {
            continue;
        }
        let label = header
            .strip_suffix(spec.suffix)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                schema_fault(format!(
                    "value column '{header}' does not follow the '<category>{}' pattern",
                    spec.suffix
                ))
            })?;
        value_cols.push((idx, label.to_string()));
    }
    if value_cols.is_empty() {
        return Err(schema_fault("no value columns to melt".to_string()));
    }

    let mut headers: Vec<String> = spec.id_columns.iter().map(|c| c.to_string()).collect();
    headers.push(spec.var_name.to_string());
    headers.push(spec.value_name.to_string());

    let mut out = Table::new(table.name.clone(), headers);
    for row in table.rows() {
        for (idx, label) in &value_cols {
            let mut cells: Vec<String> = id_idx.iter().map(|&i| row.get(i).to_string()).collect();
            cells.push(label.clone());
            cells.push(row.get(*idx).to_string());
            out.push_row(row.line, cells)?;
        }
    }

    log::debug!(
        "melted {}: {} row(s) x {} value column(s) -> {} row(s)",
        table.name,
        table.len(),
        value_cols.len(),
        out.len()
    );
    Ok(out)
}

//! The fixed fact-table catalog.
//!
//! Each `FactSpec` names a target table, the sheet(s) feeding it, whether the
//! sheet is wide and must be melted, and how every target column is filled.
//! The insert template is derived from the spec, so column order and
//! placeholder numbering can never drift apart.
//!
//! Placeholder layout of every template:
//!   ?1 .. ?m      scalar columns (values and fixed keys), in column order
//!   ?m+1 .. ?m+n  dimension labels, in column order
//!   ?m+n+1        version identifier

use crate::{
    dimension::{Axis, Dimension, DimensionJoin},
    table::Table,
    types::RunKind,
};

/// Where a target column's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    /// A label cell resolved to the dimension's surrogate key by the join.
    Label {
        alias:     &'static str,
        dimension: Dimension,
        headers:   &'static [&'static str],
    },
    /// A numeric cell written as-is.
    Value { headers: &'static [&'static str] },
    /// A surrogate key supplied by configuration rather than the sheet.
    FixedKey(FixedKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedKey {
    EnteringIntervention,
    EnteringBehavior,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactColumn {
    pub target: &'static str,
    pub source: ColumnSource,
}

/// A wide sheet: the category label lands in `var_name`, the cell in
/// `value_name`. Both name target columns of the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeltPlan {
    pub var_name:   &'static str,
    pub value_name: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactSpec {
    pub table:   &'static str,
    pub kind:    RunKind,
    /// One sheet, or two sheets inner-joined on their shared columns.
    pub sources: &'static [&'static str],
    pub melt:    Option<MeltPlan>,
    pub columns: &'static [FactColumn],
}

impl FactSpec {
    pub fn version_column(&self) -> &'static str {
        self.kind.version_column()
    }

    /// Dimension axes of the join, in column order.
    pub fn axes(&self) -> Vec<Axis> {
        self.columns
            .iter()
            .filter_map(|c| match c.source {
                ColumnSource::Label { alias, dimension, .. } => Some(Axis { alias, dimension }),
                _ => None,
            })
            .collect()
    }

    pub fn scalar_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| !matches!(c.source, ColumnSource::Label { .. }))
            .count()
    }

    /// Total placeholders a bound row must supply, version included.
    pub fn param_count(&self) -> usize {
        self.columns.len() + 1
    }

    /// The insert-select-join statement for this table.
    pub fn insert_sql(&self) -> String {
        let axes = self.axes();
        let join = DimensionJoin::new(&axes);
        let scalars = self.scalar_count();

        let mut next_scalar = 1;
        let select: Vec<String> = self
            .columns
            .iter()
            .map(|c| match c.source {
                ColumnSource::Label { alias, .. } => DimensionJoin::key_expr(alias),
                _ => {
                    let expr = format!("?{next_scalar}");
                    next_scalar += 1;
                    expr
                }
            })
            .collect();

        let targets: Vec<&str> = self.columns.iter().map(|c| c.target).collect();
        format!(
            "INSERT INTO {table} ({targets}, {version})\n    SELECT {select}, ?{version_param}\n    FROM {from}\n    WHERE {pred}",
            table = self.table,
            targets = targets.join(", "),
            version = self.version_column(),
            select = select.join(", "),
            version_param = self.param_count(),
            from = join.from_clause(),
            pred = join.where_clause(scalars + 1),
        )
    }

    /// Identifying columns of a wide sheet: the headers matched by every
    /// label column except the melted one. Absent optional columns (a
    /// defaulted `year`) are skipped.
    pub fn melt_id_columns<'t>(&self, wide: &'t Table) -> Vec<&'t str> {
        let Some(plan) = self.melt else {
            return Vec::new();
        };
        self.columns
            .iter()
            .filter(|c| c.target != plan.var_name && c.target != plan.value_name)
            .filter_map(|c| match c.source {
                ColumnSource::Label { headers, .. } => wide.find_column(headers),
                _ => None,
            })
            .map(|idx| wide.headers()[idx].as_str())
            .collect()
    }
}

// ── Header aliases ──────────────────────────────────────────────

const AGE:          &[&str] = &["agegrp", "age_group"];
const RACE:         &[&str] = &["race"];
const SEX:          &[&str] = &["sex"];
const YEAR:         &[&str] = &["year"];
const INTERVENTION: &[&str] = &["intervention", "block"];
const BEHAVIOR:     &[&str] = &["behavior", "oud"];

const fn label(target: &'static str, alias: &'static str, dimension: Dimension, headers: &'static [&'static str]) -> FactColumn {
    FactColumn {
        target,
        source: ColumnSource::Label { alias, dimension, headers },
    }
}

const fn value(target: &'static str, headers: &'static [&'static str]) -> FactColumn {
    FactColumn {
        target,
        source: ColumnSource::Value { headers },
    }
}

const fn fixed(target: &'static str, key: FixedKey) -> FactColumn {
    FactColumn {
        target,
        source: ColumnSource::FixedKey(key),
    }
}

const AGE_COL:  FactColumn = label("age_group", "a", Dimension::AgeGroup, AGE);
const RACE_COL: FactColumn = label("race", "r", Dimension::Race, RACE);
const SEX_COL:  FactColumn = label("sex", "s", Dimension::Sex, SEX);
const YEAR_COL: FactColumn = label("year", "y", Dimension::Year, YEAR);
const INTERVENTION_COL: FactColumn = label("intervention", "i", Dimension::Intervention, INTERVENTION);
const BEHAVIOR_COL:     FactColumn = label("behavior", "b", Dimension::Behavior, BEHAVIOR);

// ── Input set ───────────────────────────────────────────────────

pub const BACKGROUND_MORTALITY: FactSpec = FactSpec {
    table:   "background_mortality",
    kind:    RunKind::Inputs,
    sources: &["background_mortality.csv"],
    melt:    None,
    columns: &[
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        value("death_probability", &["death_probability", "death_prob"]),
    ],
};

pub const ENTERING_COHORT: FactSpec = FactSpec {
    table:   "entering_cohort",
    kind:    RunKind::Inputs,
    sources: &["entering_cohort.csv"],
    melt:    None,
    columns: &[
        fixed("intervention", FixedKey::EnteringIntervention),
        fixed("behavior", FixedKey::EnteringBehavior),
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        value("weekly_cohort_size_change", &["weekly_cohort_size_change", "cohort_size_change_1_52"]),
    ],
};

pub const COST: FactSpec = FactSpec {
    table:   "cost",
    kind:    RunKind::Inputs,
    sources: &["healthcare_utilization_cost.csv"],
    melt:    None,
    columns: &[
        INTERVENTION_COL,
        BEHAVIOR_COL,
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        value("healthcare", &["healthcare", "healthcare_system"]),
    ],
};

pub const INIT_COHORT: FactSpec = FactSpec {
    table:   "init_cohort",
    kind:    RunKind::Inputs,
    sources: &["init_cohort.csv"],
    melt:    None,
    columns: &[
        INTERVENTION_COL,
        BEHAVIOR_COL,
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        value("counts", &["counts"]),
    ],
};

pub const UTILITY: FactSpec = FactSpec {
    table:   "utility",
    kind:    RunKind::Inputs,
    sources: &["utility.csv"],
    melt:    None,
    columns: &[
        INTERVENTION_COL,
        AGE_COL,
        RACE_COL,
        SEX_COL,
        value("background", &["background"]),
        value("setting", &["setting"]),
    ],
};

pub const SMR: FactSpec = FactSpec {
    table:   "smr",
    kind:    RunKind::Inputs,
    sources: &["SMR.csv"],
    melt:    None,
    columns: &[
        INTERVENTION_COL,
        BEHAVIOR_COL,
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        value("smr", &["smr", "SMR"]),
    ],
};

// ── Parameter set ───────────────────────────────────────────────

pub const OVERDOSES: FactSpec = FactSpec {
    table:   "overdoses",
    kind:    RunKind::Parameters,
    sources: &["all_types_overdose.csv", "fatal_overdose.csv"],
    melt:    None,
    columns: &[
        INTERVENTION_COL,
        BEHAVIOR_COL,
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        value("percent_pop_overdoses", &["percent_pop_overdoses", "overdose_1_52"]),
        value("percent_overdoses_fatal", &["percent_overdoses_fatal", "percent_overdoses_fatal_1_52"]),
    ],
};

pub const BEHAVIOR_AFTER_INTERVENTION_CHANGE: FactSpec = FactSpec {
    table:   "behavior_transition_after_intervention_change",
    kind:    RunKind::Parameters,
    sources: &["block_init_effectv2.csv"],
    melt:    None,
    columns: &[
        label("initial_behavior", "b", Dimension::Behavior, &["initial_behavior", "initial_oud_state"]),
        label("new_intervention", "i", Dimension::Intervention, &["new_intervention", "to_intervention"]),
        YEAR_COL,
        value("retention_probability", &["retention_probability", "retention_rate"]),
    ],
};

pub const INTERVENTION_TRANSITIONS: FactSpec = FactSpec {
    table:   "intervention_transitions",
    kind:    RunKind::Parameters,
    sources: &["block_trans.csv"],
    melt:    Some(MeltPlan {
        var_name:   "end_intervention",
        value_name: "transition_probability",
    }),
    columns: &[
        label("start_intervention", "si", Dimension::Intervention, &["start_intervention", "initial_intervention"]),
        BEHAVIOR_COL,
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        label("end_intervention", "ni", Dimension::Intervention, &["end_intervention"]),
        value("transition_probability", &["transition_probability"]),
    ],
};

pub const BEHAVIOR_TRANSITIONS: FactSpec = FactSpec {
    table:   "behavior_transitions",
    kind:    RunKind::Parameters,
    sources: &["oud_trans.csv"],
    melt:    Some(MeltPlan {
        var_name:   "end_behavior",
        value_name: "transition_probability",
    }),
    columns: &[
        INTERVENTION_COL,
        label("start_behavior", "sb", Dimension::Behavior, &["start_behavior", "initial_oud"]),
        AGE_COL,
        RACE_COL,
        SEX_COL,
        YEAR_COL,
        label("end_behavior", "eb", Dimension::Behavior, &["end_behavior"]),
        value("transition_probability", &["transition_probability"]),
    ],
};

/// Input tables in load order.
pub const INPUT_TABLES: [FactSpec; 6] = [
    BACKGROUND_MORTALITY,
    ENTERING_COHORT,
    COST,
    INIT_COHORT,
    UTILITY,
    SMR,
];

/// Parameter tables in load order.
pub const PARAMETER_TABLES: [FactSpec; 4] = [
    OVERDOSES,
    BEHAVIOR_AFTER_INTERVENTION_CHANGE,
    INTERVENTION_TRANSITIONS,
    BEHAVIOR_TRANSITIONS,
];

pub fn tables_for(kind: RunKind) -> &'static [FactSpec] {
    match kind {
        RunKind::Inputs     => &INPUT_TABLES,
        RunKind::Parameters => &PARAMETER_TABLES,
    }
}

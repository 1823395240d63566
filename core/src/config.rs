use serde::{Deserialize, Serialize};
use std::path::Path;

/// Knobs for one ingestion run. Every field has a default, so an absent or
/// partial config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Year bound for sheets that carry no `year` column.
    pub default_year:                    i64,
    /// Suffix stripped from wide destination-category columns.
    pub transition_suffix:               String,
    /// Treat rows dropped by a merge as a fatal fault.
    pub fail_on_merge_loss:              bool,
    /// Surrogate keys bound for entering-cohort rows, whose sheet carries no
    /// intervention or behavior labels.
    pub entering_cohort_intervention_id: i64,
    pub entering_cohort_behavior_id:     i64,
    /// How many offending rows a resolution fault lists before truncating.
    pub max_reported_faults:             usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_year:                    2015,
            transition_suffix:               "_prob".to_string(),
            fail_on_merge_loss:              false,
            entering_cohort_intervention_id: 0,
            entering_cohort_behavior_id:     0,
            max_reported_faults:             10,
        }
    }
}

impl IngestConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: IngestConfig = serde_json::from_str(&content)?;
        if config.transition_suffix.is_empty() {
            anyhow::bail!("{}: transition_suffix must not be empty", path.display());
        }
        Ok(config)
    }
}

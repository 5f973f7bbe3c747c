//! Normalized metric rows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::query::GroupBy;
use crate::periods::normalize_date;

const PERIOD_START_COLUMN: &str = "after";
const PERIOD_END_COLUMN: &str = "before";

/// One (entity, time-bucket) pair from an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub entity_id: String,
    pub entity_name: String,
    /// Bucket start as `YYYY-MM-DD`
    pub period: String,
    /// Numeric cells keyed by column name; blank or non-numeric cells are absent
    pub fields: BTreeMap<String, f64>,
}

impl MetricRecord {
    pub fn from_row(columns: &[String], row: &[String], group_by: GroupBy) -> Self {
        let cell = |candidates: &[&str]| -> String {
            candidates
                .iter()
                .find_map(|name| columns.iter().position(|c| c == name))
                .and_then(|idx| row.get(idx))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let id_columns = group_by.id_columns();
        let name_columns = group_by.name_columns();
        let is_key_column = |c: &str| {
            id_columns.contains(&c)
                || name_columns.contains(&c)
                || c == PERIOD_START_COLUMN
                || c == PERIOD_END_COLUMN
        };

        let fields = columns
            .iter()
            .zip(row)
            .filter(|(c, _)| !is_key_column(c.as_str()))
            .filter_map(|(c, v)| v.trim().parse::<f64>().ok().map(|n| (c.clone(), n)))
            .collect();

        let period = cell(&[PERIOD_START_COLUMN]);
        Self {
            entity_id: cell(id_columns),
            entity_name: cell(name_columns),
            period: normalize_date(Some(&period)),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_team_row() {
        let columns = strings(&["team_id", "team_name", "after", "before", "branch.computed.cycle_time:p50"]);
        let row = strings(&["7", "Payments", "2024-06-01T00:00:00", "2024-07-01", "1500.5"]);

        let record = MetricRecord::from_row(&columns, &row, GroupBy::Team);
        assert_eq!(record.entity_id, "7");
        assert_eq!(record.entity_name, "Payments");
        assert_eq!(record.period, "2024-06-01");
        assert_eq!(record.field("branch.computed.cycle_time:p50"), Some(1500.5));
        assert_eq!(record.fields.len(), 1);
    }

    #[test]
    fn test_repo_columns_and_blank_metrics() {
        let columns = strings(&["repo_id", "after", "branch.time_to_pr:p50", "branch.review_time:p50"]);
        let row = strings(&["42", "2024-06-01", "", "n/a"]);

        let record = MetricRecord::from_row(&columns, &row, GroupBy::Repository);
        assert_eq!(record.entity_id, "42");
        assert_eq!(record.entity_name, "");
        assert!(record.fields.is_empty());
    }
}

//! Declarative export query

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::periods::DateRange;

/// Grouping dimension of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Team,
    Repository,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Team => "team",
            GroupBy::Repository => "repository",
        }
    }

    /// Payload field carrying the entity ids
    pub fn id_field(&self) -> &'static str {
        match self {
            GroupBy::Team => "team_ids",
            GroupBy::Repository => "repository_ids",
        }
    }

    /// Columns that may carry the entity id in the exported table
    pub fn id_columns(&self) -> &'static [&'static str] {
        match self {
            GroupBy::Team => &["team_id"],
            GroupBy::Repository => &["repository_id", "repo_id"],
        }
    }

    /// Columns that may carry the entity name in the exported table
    pub fn name_columns(&self) -> &'static [&'static str] {
        match self {
            GroupBy::Team => &["team_name"],
            GroupBy::Repository => &["repository_name", "repo_name"],
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "team" => Ok(GroupBy::Team),
            "repository" | "repo" => Ok(GroupBy::Repository),
            other => Err(Error::validation(format!("Unknown group_by '{}'", other))),
        }
    }
}

/// Time-bucketing granularity requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollUp {
    #[serde(rename = "custom")]
    Custom,
    #[serde(rename = "1d")]
    Day,
    #[serde(rename = "1w")]
    Week,
    #[serde(rename = "1m")]
    Month,
}

impl RollUp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollUp::Custom => "custom",
            RollUp::Day => "1d",
            RollUp::Week => "1w",
            RollUp::Month => "1m",
        }
    }
}

impl std::fmt::Display for RollUp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RollUp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "custom" => Ok(RollUp::Custom),
            "1d" => Ok(RollUp::Day),
            "1w" => Ok(RollUp::Week),
            "1m" => Ok(RollUp::Month),
            other => Err(Error::validation(format!(
                "Unknown roll-up '{}'. Use custom, 1d, 1w or 1m",
                other
            ))),
        }
    }
}

/// One requested metric, e.g. `branch.computed.cycle_time` at `p50`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agg: Option<String>,
}

impl MetricSpec {
    pub fn new(name: impl Into<String>, agg: Option<&str>) -> Self {
        Self {
            name: name.into(),
            agg: agg.map(str::to_string),
        }
    }

    pub fn p50(name: impl Into<String>) -> Self {
        Self::new(name, Some("p50"))
    }

    pub fn p75(name: impl Into<String>) -> Self {
        Self::new(name, Some("p75"))
    }

    /// Column header the provider uses for this metric
    pub fn column(&self) -> String {
        match &self.agg {
            Some(agg) => format!("{}:{}", self.name, agg),
            None => self.name.clone(),
        }
    }
}

/// Everything about an export except which entities it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportQuery {
    pub group_by: GroupBy,
    pub roll_up: RollUp,
    pub metrics: Vec<MetricSpec>,
    pub range: DateRange,
    /// Row limit per entity in one request (e.g. 12 for monthly roll-ups over a year)
    pub rows_per_entity: usize,
}

impl ExportQuery {
    pub fn new(group_by: GroupBy, roll_up: RollUp, metrics: Vec<MetricSpec>, range: DateRange) -> Self {
        Self {
            group_by,
            roll_up,
            metrics,
            range,
            rows_per_entity: 1,
        }
    }

    pub fn with_rows_per_entity(mut self, rows: usize) -> Self {
        self.rows_per_entity = rows.max(1);
        self
    }

    /// Request body for one batch; ids must be numeric
    pub fn payload(&self, ids: &[String]) -> Result<Value> {
        let numeric: Vec<i64> = ids
            .iter()
            .map(|id| {
                id.trim()
                    .parse::<i64>()
                    .map_err(|_| Error::validation(format!("Entity id '{}' is not numeric", id)))
            })
            .collect::<Result<_>>()?;

        let mut body = json!({
            "group_by": self.group_by,
            "roll_up": self.roll_up,
            "requested_metrics": self.metrics,
            "time_ranges": [{
                "after": self.range.after.to_string(),
                "before": self.range.before.to_string(),
            }],
            "limit": ids.len() * self.rows_per_entity,
        });
        body[self.group_by.id_field()] = json!(numeric);
        Ok(body)
    }
}

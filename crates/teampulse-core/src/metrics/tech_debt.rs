//! Tech debt backlog movement
//!
//! For every configured team epic and quarter, four counts of the child
//! issues: open at the start, resolved during, created during and open at
//! the end of the quarter.

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::aggregate::{summarize, Reducer};
use crate::config::{Config, TechDebtTeam};
use crate::error::Result;
use crate::periods::QuarterDef;
use crate::providers::jira::quoted_list;
use crate::providers::JiraClient;

/// Epic keys ending with this are unfilled config placeholders
const PLACEHOLDER_SUFFIX: &str = "XXXXX";
/// Quarters that ended longer ago than this are skipped
const RECENT_QUARTER_DAYS: i64 = 180;
const FALLBACK_QUARTER_COUNT: usize = 4;

pub fn is_configured(team: &TechDebtTeam) -> bool {
    !team.epic_key.is_empty() && !team.epic_key.ends_with(PLACEHOLDER_SUFFIX)
}

/// Quarters still running or ended within the last 180 days; the last four
/// when all are older; the current calendar quarter when none are configured
pub fn relevant_quarters(configured: &[QuarterDef], today: NaiveDate) -> Vec<QuarterDef> {
    if configured.is_empty() {
        return QuarterDef::calendar(today).into_iter().collect();
    }
    let cutoff = today - Duration::days(RECENT_QUARTER_DAYS);
    let recent: Vec<QuarterDef> = configured.iter().filter(|q| q.end > cutoff).cloned().collect();
    if !recent.is_empty() {
        return recent;
    }
    let skip = configured.len().saturating_sub(FALLBACK_QUARTER_COUNT);
    configured[skip..].to_vec()
}

/// The four JQL queries for one epic and quarter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BacklogQueries {
    pub start: String,
    pub resolved: String,
    pub created: String,
    pub end: String,
}

impl BacklogQueries {
    pub fn new(epic_key: &str, issue_types: &[String], quarter: &QuarterDef) -> Self {
        let base = format!(
            "(\"Epic Link\" = {key} OR parent = {key}) AND issuetype IN ({types})",
            key = epic_key,
            types = quoted_list(issue_types)
        );
        let (s, e) = (quarter.start, quarter.end);
        Self {
            start: format!("{base} AND created < \"{s}\" AND (resolved IS EMPTY OR resolved >= \"{s}\")"),
            resolved: format!("{base} AND resolved >= \"{s}\" AND resolved < \"{e}\""),
            created: format!("{base} AND created >= \"{s}\" AND created < \"{e}\""),
            end: format!("{base} AND created < \"{e}\" AND (resolved IS EMPTY OR resolved >= \"{e}\")"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BacklogCounts {
    pub start_count: u64,
    pub resolved_count: u64,
    pub created_count: u64,
    pub end_count: u64,
}

/// One team's counts for one quarter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechDebtRow {
    pub team_name: String,
    pub epic_key: String,
    pub quarter: String,
    pub start_count: u64,
    pub resolved_count: u64,
    pub created_count: u64,
    pub end_count: u64,
}

impl TechDebtRow {
    pub fn new(team: &TechDebtTeam, quarter: &QuarterDef, counts: BacklogCounts) -> Self {
        Self {
            team_name: team.name.clone(),
            epic_key: team.epic_key.clone(),
            quarter: quarter.name.clone(),
            start_count: counts.start_count,
            resolved_count: counts.resolved_count,
            created_count: counts.created_count,
            end_count: counts.end_count,
        }
    }

    pub fn counts(&self) -> BacklogCounts {
        BacklogCounts {
            start_count: self.start_count,
            resolved_count: self.resolved_count,
            created_count: self.created_count,
            end_count: self.end_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QuarterTotals {
    pub total_start: u64,
    pub total_resolved: u64,
    pub total_created: u64,
    pub total_end: u64,
    /// Created minus resolved
    pub net_change: i64,
}

/// Sums every count across the rows of a group
pub struct BacklogTotals;

impl Reducer<TechDebtRow> for BacklogTotals {
    type Output = QuarterTotals;

    fn reduce(&self, rows: &[&TechDebtRow]) -> QuarterTotals {
        let mut totals = QuarterTotals::default();
        for row in rows {
            totals.total_start += row.start_count;
            totals.total_resolved += row.resolved_count;
            totals.total_created += row.created_count;
            totals.total_end += row.end_count;
        }
        totals.net_change = totals.total_created as i64 - totals.total_resolved as i64;
        totals
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterSummary {
    pub quarter: String,
    #[serde(flatten)]
    pub totals: QuarterTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechDebtReport {
    pub generated_at: String,
    pub quarters: Vec<String>,
    pub total_teams: usize,
    /// In quarter order
    pub summary: Vec<QuarterSummary>,
    /// Team-major, quarters in order within each team
    pub rows: Vec<TechDebtRow>,
}

impl TechDebtReport {
    pub fn build(quarters: &[QuarterDef], total_teams: usize, rows: Vec<TechDebtRow>) -> Self {
        let summary = quarters
            .iter()
            .map(|q| {
                let members: Vec<TechDebtRow> = rows.iter().filter(|r| r.quarter == q.name).cloned().collect();
                QuarterSummary {
                    quarter: q.name.clone(),
                    totals: summarize(&members, &BacklogTotals).value,
                }
            })
            .collect();

        Self {
            generated_at: Utc::now().to_rfc3339(),
            quarters: quarters.iter().map(|q| q.name.clone()).collect(),
            total_teams,
            summary,
            rows,
        }
    }

    pub fn to_csv(&self) -> Result<String> {
        super::to_csv(&self.rows)
    }
}

pub struct TechDebtPipeline<'a> {
    client: &'a JiraClient,
    config: &'a Config,
}

impl<'a> TechDebtPipeline<'a> {
    pub fn new(client: &'a JiraClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    async fn counts(&self, epic_key: &str, quarter: &QuarterDef) -> Result<BacklogCounts> {
        let queries = BacklogQueries::new(epic_key, &self.config.tech_debt.issue_types, quarter);
        Ok(BacklogCounts {
            start_count: self.client.count(&queries.start).await?,
            resolved_count: self.client.count(&queries.resolved).await?,
            end_count: self.client.count(&queries.end).await?,
            created_count: self.client.count(&queries.created).await?,
        })
    }

    pub async fn run(&self, today: NaiveDate) -> Result<TechDebtReport> {
        let quarters = relevant_quarters(&self.config.quarters, today);
        log::info!(
            "[tech_debt] Quarters: {}",
            quarters.iter().map(|q| q.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut rows = Vec::new();
        let mut teams = 0;
        for team in &self.config.tech_debt.teams {
            if !is_configured(team) {
                log::warn!("[tech_debt] Skipping {}: epic key not configured", team.name);
                continue;
            }
            teams += 1;
            for quarter in &quarters {
                let counts = self.counts(&team.epic_key, quarter).await?;
                log::info!(
                    "[tech_debt] {} {}: start={} resolved={} created={} end={}",
                    team.name,
                    quarter.name,
                    counts.start_count,
                    counts.resolved_count,
                    counts.created_count,
                    counts.end_count
                );
                rows.push(TechDebtRow::new(team, quarter, counts));
            }
        }

        Ok(TechDebtReport::build(&quarters, teams, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;
    use crate::http::{RequestClient, RetryPolicy};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn q(year: i32, n: u32) -> QuarterDef {
        QuarterDef::for_year_quarter(year, n).unwrap()
    }

    fn team(name: &str, key: &str) -> TechDebtTeam {
        TechDebtTeam {
            name: name.into(),
            epic_key: key.into(),
        }
    }

    #[test]
    fn test_placeholder_keys_skipped() {
        assert!(is_configured(&team("Web", "ENG-12")));
        assert!(!is_configured(&team("Web", "")));
        assert!(!is_configured(&team("Web", "ENG-XXXXX")));
    }

    #[test]
    fn test_relevant_quarters() {
        let configured: Vec<QuarterDef> = (1..=4).map(|n| q(2024, n)).collect();

        let recent = relevant_quarters(&configured, d(2024, 11, 15));
        let names: Vec<&str> = recent.iter().map(|q| q.name.as_str()).collect();
        assert_eq!(names, vec!["2024 Q2", "2024 Q3", "2024 Q4"]);

        let stale = relevant_quarters(&configured, d(2027, 1, 1));
        assert_eq!(stale.len(), 4);

        let current = relevant_quarters(&[], d(2024, 8, 9));
        assert_eq!(current, vec![q(2024, 3)]);
    }

    #[test]
    fn test_backlog_queries() {
        let queries = BacklogQueries::new("ENG-1", &["Story".to_string(), "Bug".to_string()], &q(2024, 3));
        let base = "(\"Epic Link\" = ENG-1 OR parent = ENG-1) AND issuetype IN (\"Story\", \"Bug\")";
        assert_eq!(
            queries.start,
            format!("{base} AND created < \"2024-07-01\" AND (resolved IS EMPTY OR resolved >= \"2024-07-01\")")
        );
        assert_eq!(
            queries.resolved,
            format!("{base} AND resolved >= \"2024-07-01\" AND resolved < \"2024-10-01\"")
        );
        assert_eq!(
            queries.created,
            format!("{base} AND created >= \"2024-07-01\" AND created < \"2024-10-01\"")
        );
        assert_eq!(
            queries.end,
            format!("{base} AND created < \"2024-10-01\" AND (resolved IS EMPTY OR resolved >= \"2024-10-01\")")
        );
    }

    #[test]
    fn test_summary_net_change() {
        let row = |team: &str, quarter: &str, resolved: u64, created: u64| TechDebtRow {
            team_name: team.into(),
            epic_key: "K".into(),
            quarter: quarter.into(),
            start_count: 10,
            resolved_count: resolved,
            created_count: created,
            end_count: 10 + created - resolved,
        };
        let quarters = vec![q(2024, 2), q(2024, 3)];
        let report = TechDebtReport::build(
            &quarters,
            2,
            vec![row("A", "2024 Q2", 5, 2), row("B", "2024 Q2", 1, 4), row("A", "2024 Q3", 0, 1)],
        );

        assert_eq!(report.summary[0].quarter, "2024 Q2");
        assert_eq!(report.summary[0].totals.total_start, 20);
        assert_eq!(report.summary[0].totals.total_resolved, 6);
        assert_eq!(report.summary[0].totals.net_change, 0);
        assert_eq!(report.summary[1].totals.net_change, 1);

        let csv = report.to_csv().unwrap();
        assert!(csv.starts_with(
            "team_name,epic_key,quarter,start_count,resolved_count,created_count,end_count\nA,K,2024 Q2,10,5,2,7\n"
        ));
    }

    #[tokio::test]
    async fn test_pipeline_issues_four_counts_per_quarter() {
        let mock = Arc::new(MockTransport::new());
        for total in [3, 1, 2, 4] {
            mock.push_json(200, json!({"issues": [], "total": total}));
        }

        let mut config = Config::default();
        config.jira.base_url = "https://jira.test".into();
        config.quarters = vec![q(2024, 3)];
        config.tech_debt.teams = vec![team("Web", "ENG-1"), team("Later", "ENG-XXXXX")];
        let client = JiraClient::new(
            &config.jira,
            RequestClient::new(mock.clone(), RetryPolicy::with_unit(StdDuration::from_millis(1))),
            "pat",
        )
        .unwrap();

        let report = TechDebtPipeline::new(&client, &config).run(d(2024, 8, 1)).await.unwrap();
        assert_eq!(report.total_teams, 1);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(
            report.rows[0].counts(),
            BacklogCounts {
                start_count: 3,
                resolved_count: 1,
                end_count: 2,
                created_count: 4,
            }
        );
        assert_eq!(mock.request_count(), 4);
        assert_eq!(report.summary[0].totals.net_change, 3);
    }
}

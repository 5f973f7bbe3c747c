//! Incident counts by team and quarter

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::{aggregate, count_by, Collect, GroupKey};
use crate::config::Config;
use crate::error::Result;
use crate::periods::{parse_date_prefix, CalendarBucketer, PeriodBucketer};
use crate::providers::{Issue, JiraClient};

pub const UNASSIGNED: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Incident {
    pub key: String,
    pub summary: String,
    pub team: String,
    pub team_raw: Option<String>,
    pub created_date: String,
    /// `None` when the created date is missing or unparseable
    pub quarter: Option<String>,
    pub priority: String,
    pub status: String,
    pub resolved_date: String,
}

impl Incident {
    pub fn from_issue(
        issue: &Issue,
        team_field: &str,
        team_names: &BTreeMap<String, String>,
        bucketer: &CalendarBucketer,
    ) -> Self {
        let team_raw = issue.field_text(team_field);
        let team = match &team_raw {
            Some(raw) => team_names.get(raw).cloned().unwrap_or_else(|| raw.clone()),
            None => UNASSIGNED.to_string(),
        };
        let created_date = issue.date("created");
        let quarter = parse_date_prefix(&created_date).map(|d| bucketer.bucket(d));

        Self {
            key: issue.key.clone(),
            summary: issue.summary(),
            team,
            team_raw,
            created_date,
            quarter,
            priority: issue.name_of("priority"),
            status: issue.name_of("status"),
            resolved_date: issue.date("resolutiondate"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

impl LabelCount {
    fn from_counts(counts: Vec<(GroupKey, usize)>) -> Vec<Self> {
        counts
            .into_iter()
            .map(|(key, count)| Self {
                label: key.label(),
                count,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamIncidents {
    pub team: String,
    pub total: usize,
    pub by_quarter: Vec<LabelCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuarterIncidents {
    pub quarter: String,
    pub total: usize,
    pub by_team: Vec<LabelCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentSummary {
    pub total_incidents: usize,
    pub total_teams: usize,
    pub total_quarters: usize,
    pub by_priority: Vec<LabelCount>,
    pub by_status: Vec<LabelCount>,
}

/// Flattened team x quarter count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamQuarterRow {
    pub team_name: String,
    pub quarter: String,
    pub incident_count: usize,
}

#[derive(Debug, Clone, Serialize)]
struct DetailedRow<'a> {
    key: &'a str,
    summary: &'a str,
    team: &'a str,
    quarter: &'a str,
    priority: &'a str,
    status: &'a str,
    created_date: &'a str,
    resolved_date: &'a str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentReport {
    pub generated_at: String,
    pub summary: IncidentSummary,
    pub teams: Vec<TeamIncidents>,
    pub by_quarter: Vec<QuarterIncidents>,
    #[serde(skip)]
    pub incidents: Vec<Incident>,
    pub issue_count: usize,
}

impl IncidentReport {
    /// Team and quarter breakdowns cover incidents with a quarter only
    pub fn build(incidents: Vec<Incident>) -> Self {
        let dated: Vec<Incident> = incidents.iter().filter(|i| i.quarter.is_some()).cloned().collect();
        let quarter_of = |i: &Incident| GroupKey::period(i.quarter.clone().unwrap_or_default());

        let teams: Vec<TeamIncidents> = aggregate(&dated, |i| GroupKey::name(&i.team), &Collect)
            .into_iter()
            .map(|(key, group)| TeamIncidents {
                team: key.label(),
                total: group.count,
                by_quarter: LabelCount::from_counts(count_by(&group.value, quarter_of)),
            })
            .collect();

        let by_quarter: Vec<QuarterIncidents> = aggregate(&dated, quarter_of, &Collect)
            .into_iter()
            .map(|(key, group)| QuarterIncidents {
                quarter: key.label(),
                total: group.count,
                by_team: LabelCount::from_counts(count_by(&group.value, |i| GroupKey::name(&i.team))),
            })
            .collect();

        let summary = IncidentSummary {
            total_incidents: incidents.len(),
            total_teams: teams.len(),
            total_quarters: by_quarter.len(),
            by_priority: LabelCount::from_counts(count_by(&incidents, |i| GroupKey::name(&i.priority))),
            by_status: LabelCount::from_counts(count_by(&incidents, |i| GroupKey::name(&i.status))),
        };

        Self {
            generated_at: Utc::now().to_rfc3339(),
            summary,
            teams,
            by_quarter,
            issue_count: incidents.len(),
            incidents,
        }
    }

    /// One row per (team, quarter), ordered by quarter then team
    pub fn team_quarter_rows(&self) -> Vec<TeamQuarterRow> {
        self.by_quarter
            .iter()
            .flat_map(|q| {
                q.by_team.iter().map(move |t| TeamQuarterRow {
                    team_name: t.label.clone(),
                    quarter: q.quarter.clone(),
                    incident_count: t.count,
                })
            })
            .collect()
    }

    pub fn to_csv(&self) -> Result<String> {
        super::to_csv(&self.team_quarter_rows())
    }

    /// Every incident, including undated ones
    pub fn detailed_csv(&self) -> Result<String> {
        let rows: Vec<DetailedRow> = self
            .incidents
            .iter()
            .map(|i| DetailedRow {
                key: &i.key,
                summary: &i.summary,
                team: &i.team,
                quarter: i.quarter.as_deref().unwrap_or_default(),
                priority: &i.priority,
                status: &i.status,
                created_date: &i.created_date,
                resolved_date: &i.resolved_date,
            })
            .collect();
        super::to_csv(&rows)
    }
}

pub struct IncidentPipeline<'a> {
    client: &'a JiraClient,
    config: &'a Config,
}

impl<'a> IncidentPipeline<'a> {
    pub fn new(client: &'a JiraClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    pub async fn run(&self, jql: Option<&str>, today: NaiveDate) -> Result<IncidentReport> {
        let settings = &self.config.incidents;
        let team_field = &self.config.jira.fields.tech_team;
        let jql = jql.unwrap_or(&settings.jql);
        let fields: Vec<String> = [
            "key",
            "summary",
            "status",
            "created",
            "resolutiondate",
            "priority",
            "labels",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(team_field.clone()))
        .collect();

        let bucketer = CalendarBucketer::from_config(&self.config.quarters, today)?;
        let issues = self.client.search(jql, &fields, settings.max_results).await?;
        let incidents: Vec<Incident> = issues
            .iter()
            .map(|i| Incident::from_issue(i, team_field, &settings.team_names, &bucketer))
            .collect();

        let report = IncidentReport::build(incidents);
        log::info!(
            "[incidents] {} incidents across {} teams and {} quarters",
            report.summary.total_incidents,
            report.summary.total_teams,
            report.summary.total_quarters
        );
        Ok(report)
    }
}

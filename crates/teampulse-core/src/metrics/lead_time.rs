//! Epic lead time
//!
//! Lead time runs from the PRD start date (else creation) to the release
//! date (else resolution), in whole days. Epics are summarised overall and
//! per fiscal quarter of their end date, for three focus scopes.

use chrono::Utc;
use serde::Serialize;

use crate::aggregate::{aggregate, round1, Collect, GroupKey, Stats};
use crate::config::{Config, JiraFields};
use crate::error::Result;
use crate::periods::{parse_date_prefix, FiscalBucketer, PeriodBucketer};
use crate::providers::{Issue, JiraClient};

pub const NO_END_DATE: &str = "No End Date";
pub const UNKNOWN_QUARTER: &str = "Unknown";

/// Weeks and days, e.g. `"3w 2d"`; negative spans are flagged
pub fn days_to_readable(days: Option<i64>) -> String {
    let Some(days) = days else {
        return String::new();
    };
    if days < 0 {
        return format!("{}d (negative)", days);
    }
    let (weeks, rest) = (days / 7, days % 7);
    match (weeks, rest) {
        (0, _) => format!("{}d", days),
        (w, 0) => format!("{}w", w),
        (w, d) => format!("{}w {}d", w, d),
    }
}

/// Whole days from `start` to `end`, when both are dates
pub fn lead_time_days(start: &str, end: &str) -> Option<i64> {
    let start = parse_date_prefix(start)?;
    let end = parse_date_prefix(end)?;
    Some((end - start).num_days())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicLeadTime {
    pub epic_key: String,
    pub summary: String,
    pub status: String,
    pub tech_team: String,
    pub prd_start_date: String,
    pub release_date: String,
    pub created_date: String,
    pub resolved_date: String,
    pub lead_time_start: String,
    pub lead_time_start_source: String,
    pub lead_time_end: String,
    pub lead_time_end_source: String,
    pub lead_time_days: Option<i64>,
    pub lead_time_readable: String,
}

impl EpicLeadTime {
    pub fn from_issue(issue: &Issue, fields: &JiraFields) -> Self {
        let prd_start_date = issue.date(&fields.prd_start_date);
        let release_date = issue.date(&fields.release_date);
        let created_date = issue.date("created");
        let resolved_date = issue.date("resolutiondate");

        let (start, start_source) = if prd_start_date.is_empty() {
            (created_date.clone(), "Created Date")
        } else {
            (prd_start_date.clone(), "PRD Start Date")
        };
        let (end, end_source) = if release_date.is_empty() {
            (resolved_date.clone(), "Resolved Date")
        } else {
            (release_date.clone(), "Release Date")
        };
        let days = lead_time_days(&start, &end);

        Self {
            epic_key: issue.key.clone(),
            summary: issue.summary(),
            status: issue.name_of("status"),
            tech_team: issue.field_text(&fields.tech_team).unwrap_or_default(),
            prd_start_date,
            release_date,
            created_date,
            resolved_date,
            lead_time_start: start,
            lead_time_start_source: start_source.to_string(),
            lead_time_end: end,
            lead_time_end_source: end_source.to_string(),
            lead_time_days: days,
            lead_time_readable: days_to_readable(days),
        }
    }

    /// Fiscal quarter of the end date, or a placeholder label
    pub fn quarter(&self, bucketer: &FiscalBucketer) -> String {
        if self.lead_time_end.is_empty() {
            return NO_END_DATE.to_string();
        }
        match parse_date_prefix(&self.lead_time_end) {
            Some(end) => bucketer.bucket(end),
            None => UNKNOWN_QUARTER.to_string(),
        }
    }
}

/// Longest first, epics without a lead time last
pub fn sort_by_lead_time(epics: &mut [EpicLeadTime]) {
    epics.sort_by_key(|e| (e.lead_time_days.is_none(), std::cmp::Reverse(e.lead_time_days.unwrap_or(0))));
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeSummary {
    pub total_epics: usize,
    pub epics_with_lead_time: usize,
    pub avg_lead_time_days: Option<f64>,
    pub median_lead_time_days: Option<f64>,
    pub min_lead_time_days: Option<i64>,
    pub max_lead_time_days: Option<i64>,
    pub avg_lead_time_readable: String,
    pub median_lead_time_readable: String,
}

impl LeadTimeSummary {
    pub fn of(epics: &[EpicLeadTime]) -> Self {
        let values: Vec<f64> = epics
            .iter()
            .filter_map(|e| e.lead_time_days)
            .map(|d| d as f64)
            .collect();
        let stats = Stats::of(&values);

        Self {
            total_epics: epics.len(),
            epics_with_lead_time: values.len(),
            avg_lead_time_days: stats.map(|s| round1(s.mean)),
            median_lead_time_days: stats.map(|s| s.median),
            min_lead_time_days: stats.map(|s| s.min as i64),
            max_lead_time_days: stats.map(|s| s.max as i64),
            avg_lead_time_readable: days_to_readable(stats.map(|s| s.mean.round() as i64)),
            median_lead_time_readable: days_to_readable(stats.map(|s| s.median.trunc() as i64)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    All,
    FocusOnly,
    ExcludingFocus,
}

impl Scope {
    pub const EVERY: [Scope; 3] = [Scope::FocusOnly, Scope::All, Scope::ExcludingFocus];

    pub fn label(&self) -> &'static str {
        match self {
            Scope::All => "All epics",
            Scope::FocusOnly => "Focus teams only",
            Scope::ExcludingFocus => "Excluding focus teams",
        }
    }

    fn includes(&self, epic: &EpicLeadTime, focus_modules: &[String]) -> bool {
        match self {
            Scope::All => true,
            Scope::FocusOnly => is_focus_epic(&epic.tech_team, focus_modules),
            Scope::ExcludingFocus => !is_focus_epic(&epic.tech_team, focus_modules),
        }
    }
}

/// Any comma-separated tech module in the focus list
pub fn is_focus_epic(tech_team: &str, focus_modules: &[String]) -> bool {
    tech_team
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .any(|m| focus_modules.iter().any(|f| f == m))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuarterEpics {
    pub quarter: String,
    pub summary: LeadTimeSummary,
    pub epics: Vec<EpicLeadTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeDataset {
    pub scope: Scope,
    pub name: String,
    pub summary: LeadTimeSummary,
    /// Chronological; placeholder quarters last
    pub by_quarter: Vec<QuarterEpics>,
    pub epics: Vec<EpicLeadTime>,
}

impl LeadTimeDataset {
    pub fn build(scope: Scope, epics: Vec<EpicLeadTime>, bucketer: &FiscalBucketer) -> Self {
        let by_quarter = aggregate(&epics, |e| GroupKey::period(e.quarter(bucketer)), &Collect)
            .into_iter()
            .map(|(key, group)| QuarterEpics {
                quarter: key.label(),
                summary: LeadTimeSummary::of(&group.value),
                epics: group.value,
            })
            .collect();

        Self {
            scope,
            name: scope.label().to_string(),
            summary: LeadTimeSummary::of(&epics),
            by_quarter,
            epics,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeadTimeReport {
    pub generated_at: String,
    pub default_scope: Scope,
    pub datasets: Vec<LeadTimeDataset>,
}

impl LeadTimeReport {
    pub fn build(mut epics: Vec<EpicLeadTime>, focus_modules: &[String], bucketer: &FiscalBucketer) -> Self {
        sort_by_lead_time(&mut epics);
        let datasets = Scope::EVERY
            .iter()
            .map(|scope| {
                let members: Vec<EpicLeadTime> = epics
                    .iter()
                    .filter(|e| scope.includes(e, focus_modules))
                    .cloned()
                    .collect();
                LeadTimeDataset::build(*scope, members, bucketer)
            })
            .collect();

        Self {
            generated_at: Utc::now().to_rfc3339(),
            default_scope: Scope::FocusOnly,
            datasets,
        }
    }

    pub fn dataset(&self, scope: Scope) -> Option<&LeadTimeDataset> {
        self.datasets.iter().find(|d| d.scope == scope)
    }

    /// Every epic, sorted by lead time
    pub fn epics(&self) -> &[EpicLeadTime] {
        self.dataset(Scope::All).map(|d| d.epics.as_slice()).unwrap_or_default()
    }
}

pub struct LeadTimePipeline<'a> {
    client: &'a JiraClient,
    config: &'a Config,
}

impl<'a> LeadTimePipeline<'a> {
    pub fn new(client: &'a JiraClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    pub async fn run(&self, jql: Option<&str>) -> Result<LeadTimeReport> {
        let fields = &self.config.jira.fields;
        let jql = jql.unwrap_or(&self.config.lead_time.jql);
        let requested: Vec<String> = ["key", "summary", "status", "created", "resolutiondate"]
            .iter()
            .map(|f| f.to_string())
            .chain([
                fields.prd_start_date.clone(),
                fields.release_date.clone(),
                fields.tech_team.clone(),
                fields.qa_team.clone(),
            ])
            .collect();

        let issues = self
            .client
            .search(jql, &requested, self.config.jira.max_results)
            .await?;
        let epics: Vec<EpicLeadTime> = issues.iter().map(|i| EpicLeadTime::from_issue(i, fields)).collect();

        log::info!(
            "[lead_time] {} epics, {} with a lead time",
            epics.len(),
            epics.iter().filter(|e| e.lead_time_days.is_some()).count()
        );

        let bucketer = FiscalBucketer::new(&self.config.fiscal);
        Ok(LeadTimeReport::build(epics, &self.config.jira.focus.tech_teams, &bucketer))
    }
}

//! Tech module share of epic estimates
//!
//! For each epic, the share of its open child work (in person-weeks of
//! original estimate) that belongs to the focus teams.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::aggregate::{summarize, ShareSummary, WeightedShare};
use crate::config::{Config, FocusTeams, JiraFields, TechModuleConfig};
use crate::error::Result;
use crate::providers::{Issue, JiraClient};

/// 5 days of 8 hours
pub const SECONDS_PER_PERSON_WEEK: f64 = 144_000.0;

const CLOSED_STATUSES: [&str; 2] = ["Done", "Not Needed"];

/// Estimate seconds as person-weeks, one decimal
pub fn person_weeks(seconds: f64) -> f64 {
    (seconds / SECONDS_PER_PERSON_WEEK * 10.0).round() / 10.0
}

/// Seconds as `"2d 3h 0m"`, truncated to whole minutes; zero renders empty
pub fn format_estimate_dhm(seconds: f64) -> String {
    if seconds == 0.0 || !seconds.is_finite() {
        return String::new();
    }
    let total = (seconds / 60.0).trunc() as i64;
    let (days, rem) = (total.div_euclid(1440), total.rem_euclid(1440));
    let (hours, mins) = (rem / 60, rem % 60);

    let mut parts = Vec::with_capacity(3);
    if days != 0 {
        parts.push(format!("{}d", days));
    }
    if hours != 0 || days != 0 {
        parts.push(format!("{}h", hours));
    }
    parts.push(format!("{}m", mins));
    parts.join(" ")
}

/// One child issue that counts toward its epic's estimate
#[derive(Debug, Clone, PartialEq)]
pub struct ChildWork {
    pub key: String,
    pub person_weeks: f64,
    pub focus: bool,
}

impl ChildWork {
    /// `None` unless the issue is open, has a role field and an estimate
    pub fn qualify(issue: &Issue, fields: &JiraFields, focus: &FocusTeams) -> Option<Self> {
        if CLOSED_STATUSES.contains(&issue.name_of("status").as_str()) {
            return None;
        }

        let has_role = std::iter::once(&fields.tech_team)
            .chain(std::iter::once(&fields.qa_team))
            .chain(fields.role_fields.iter())
            .any(|id| issue.field_text(id).is_some());
        if !has_role {
            return None;
        }

        let seconds = issue.number("timeoriginalestimate").filter(|s| *s != 0.0)?;
        Some(Self {
            key: issue.key.clone(),
            person_weeks: person_weeks(seconds),
            focus: is_focus_work(issue, fields, focus),
        })
    }
}

/// Tech team or QA team in the focus lists, or a focus PM/designer assignee
pub fn is_focus_work(issue: &Issue, fields: &JiraFields, focus: &FocusTeams) -> bool {
    let in_list = |id: &str, list: &[String]| {
        issue
            .field(id)
            .map(|v| v.entries().iter().any(|e| list.contains(e)))
            .unwrap_or(false)
    };
    if in_list(&fields.tech_team, &focus.tech_teams) || in_list(&fields.qa_team, &focus.qa_teams) {
        return true;
    }

    match issue.assignee_email() {
        Some(email) => {
            let email = email.to_lowercase();
            focus
                .pm_emails
                .iter()
                .chain(focus.designer_emails.iter())
                .any(|e| e.to_lowercase() == email)
        }
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpicShare {
    pub issue_key: String,
    pub issue_type: String,
    pub summary: String,
    pub prd_start_date: String,
    pub release_date: String,
    pub assignee: String,
    pub created: String,
    pub resolved: String,
    pub total_estimate_seconds: f64,
    pub total_estimate_dhm: String,
    pub total_estimate_pw: f64,
    pub tech_module_pw: f64,
    pub tech_module_pct: f64,
    /// Children linked to the epic, qualifying or not
    pub roadmap_issues_count: usize,
}

impl EpicShare {
    pub fn build(epic: &Issue, children: &[Issue], fields: &JiraFields, focus: &FocusTeams) -> Self {
        let work: Vec<ChildWork> = children
            .iter()
            .filter_map(|c| ChildWork::qualify(c, fields, focus))
            .collect();
        let share: ShareSummary = summarize(
            &work,
            &WeightedShare::new(|w: &ChildWork| w.person_weeks, |w: &ChildWork| w.focus),
        )
        .value;
        let total_seconds = share.total * SECONDS_PER_PERSON_WEEK;

        Self {
            issue_key: epic.key.clone(),
            issue_type: epic.name_of("issuetype"),
            summary: epic.summary(),
            prd_start_date: epic.date(&fields.prd_start_date),
            release_date: epic.date(&fields.release_date),
            assignee: epic.assignee_name(),
            created: epic.date("created"),
            resolved: epic.date("resolutiondate"),
            total_estimate_seconds: total_seconds,
            total_estimate_dhm: format_estimate_dhm(total_seconds),
            total_estimate_pw: share.total,
            tech_module_pw: share.matched,
            tech_module_pct: share.percentage,
            roadmap_issues_count: children.len(),
        }
    }
}

/// CSV row of an epic at or above the threshold
#[derive(Debug, Clone, Serialize)]
pub struct EpicShareRow<'a> {
    #[serde(rename = "Issue Key")]
    pub issue_key: &'a str,
    #[serde(rename = "Issue Type")]
    pub issue_type: &'a str,
    #[serde(rename = "Summary")]
    pub summary: &'a str,
    #[serde(rename = "PRD Start Date")]
    pub prd_start_date: &'a str,
    #[serde(rename = "Release Date")]
    pub release_date: &'a str,
    #[serde(rename = "Assignee")]
    pub assignee: &'a str,
    #[serde(rename = "Created")]
    pub created: &'a str,
    #[serde(rename = "Resolved")]
    pub resolved: &'a str,
    #[serde(rename = "Total Estimate (person-weeks)")]
    pub total_estimate_pw: f64,
    #[serde(rename = "Tech Module %")]
    pub tech_module_pct: f64,
    #[serde(rename = "Roadmap Issues Count")]
    pub roadmap_issues_count: usize,
}

impl<'a> From<&'a EpicShare> for EpicShareRow<'a> {
    fn from(e: &'a EpicShare) -> Self {
        Self {
            issue_key: &e.issue_key,
            issue_type: &e.issue_type,
            summary: &e.summary,
            prd_start_date: &e.prd_start_date,
            release_date: &e.release_date,
            assignee: &e.assignee,
            created: &e.created,
            resolved: &e.resolved,
            total_estimate_pw: e.total_estimate_pw,
            tech_module_pct: e.tech_module_pct,
            roadmap_issues_count: e.roadmap_issues_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechModuleReport {
    pub min_pct: f64,
    /// Every epic processed, in search order
    pub epics: Vec<EpicShare>,
}

impl TechModuleReport {
    /// Epics at or above the threshold, highest share first
    pub fn above_threshold(&self) -> Vec<&EpicShare> {
        let mut selected: Vec<&EpicShare> = self
            .epics
            .iter()
            .filter(|e| e.tech_module_pct >= self.min_pct)
            .collect();
        selected.sort_by(|a, b| b.tech_module_pct.total_cmp(&a.tech_module_pct));
        selected
    }

    pub fn below_threshold_count(&self) -> usize {
        self.epics.len() - self.above_threshold().len()
    }

    /// Mean share of the epics above the threshold
    pub fn average_above_threshold(&self) -> Option<f64> {
        let values: Vec<f64> = self.above_threshold().iter().map(|e| e.tech_module_pct).collect();
        crate::aggregate::mean(&values)
    }

    pub fn to_csv(&self) -> Result<String> {
        let rows: Vec<EpicShareRow> = self.above_threshold().into_iter().map(EpicShareRow::from).collect();
        super::to_csv(&rows)
    }
}

/// Group children under the epic they link to, via the epic-link field or
/// `parent.key`. Children of epics outside `epic_keys` are dropped.
pub fn group_children(children: Vec<Issue>, epic_keys: &[String], epic_link_field: &str) -> BTreeMap<String, Vec<Issue>> {
    let known: HashSet<&str> = epic_keys.iter().map(String::as_str).collect();
    let mut grouped: BTreeMap<String, Vec<Issue>> = BTreeMap::new();
    for child in children {
        let link = child.field_text(epic_link_field).or_else(|| child.parent_key());
        if let Some(link) = link.filter(|l| known.contains(l.as_str())) {
            grouped.entry(link).or_default().push(child);
        }
    }
    grouped
}

pub struct TechModulePipeline<'a> {
    client: &'a JiraClient,
    config: &'a Config,
}

impl<'a> TechModulePipeline<'a> {
    pub fn new(client: &'a JiraClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    fn settings(&self) -> &TechModuleConfig {
        &self.config.tech_module
    }

    fn child_fields(&self) -> Vec<String> {
        let f = &self.config.jira.fields;
        ["key", "summary", "status", "assignee", "timeoriginalestimate", "parent"]
            .iter()
            .map(|s| s.to_string())
            .chain([f.epic_link.clone(), f.tech_team.clone(), f.qa_team.clone()])
            .chain(f.role_fields.iter().cloned())
            .collect()
    }

    /// Children via `"Epic Link"`, falling back to `parent` when the first
    /// pass finds nothing at all
    async fn fetch_children(&self, epic_keys: &[String]) -> Result<Vec<Issue>> {
        let mut children = self.fetch_children_by("\"Epic Link\"", epic_keys).await?;
        if children.is_empty() && !epic_keys.is_empty() {
            log::warn!("[tech_module] No children found via Epic Link, trying parent");
            children = self.fetch_children_by("parent", epic_keys).await?;
        }
        Ok(children)
    }

    async fn fetch_children_by(&self, link: &str, epic_keys: &[String]) -> Result<Vec<Issue>> {
        let settings = self.settings();
        let fields = self.child_fields();
        let batches = epic_keys.len().div_ceil(settings.epic_batch_size);

        let mut children = Vec::new();
        for (idx, batch) in epic_keys.chunks(settings.epic_batch_size).enumerate() {
            if batches > 1 {
                log::info!("[tech_module] Child batch {}/{}", idx + 1, batches);
            }
            let jql = format!(
                "{} IN ({}) AND issuetype = {}",
                link,
                batch.join(", "),
                settings.child_issue_type
            );
            children.extend(self.client.search(&jql, &fields, settings.child_max_results).await?);
        }
        Ok(children)
    }

    pub async fn run(&self, jql: Option<&str>, min_pct: Option<f64>) -> Result<TechModuleReport> {
        let settings = self.settings();
        let fields = &self.config.jira.fields;
        let jql = jql.unwrap_or(&settings.jql);

        let epic_fields: Vec<String> = [
            "key",
            "issuetype",
            "summary",
            "status",
            "assignee",
            "created",
            "resolutiondate",
            "timeoriginalestimate",
        ]
        .iter()
        .map(|s| s.to_string())
        .chain([fields.prd_start_date.clone(), fields.release_date.clone()])
        .collect();

        let epics = self
            .client
            .search(jql, &epic_fields, self.config.jira.max_results)
            .await?;
        let epic_keys: Vec<String> = epics.iter().map(|e| e.key.clone()).collect();

        let children = self.fetch_children(&epic_keys).await?;
        log::info!(
            "[tech_module] {} child issues across {} epics",
            children.len(),
            epic_keys.len()
        );
        let by_epic = group_children(children, &epic_keys, &fields.epic_link);

        let shares = epics
            .iter()
            .map(|epic| {
                let children = by_epic.get(&epic.key).map(Vec::as_slice).unwrap_or_default();
                EpicShare::build(epic, children, fields, &self.config.jira.focus)
            })
            .collect();

        Ok(TechModuleReport {
            min_pct: min_pct.unwrap_or(settings.min_pct),
            epics: shares,
        })
    }
}

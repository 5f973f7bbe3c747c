//! Cycle time
//!
//! Exports P50 (and for repositories P75) cycle-time breakdowns for one of
//! three populations, augments the merged table with readable durations and
//! computes headline averages. Also builds the monthly per-team dashboard.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::aggregate::{aggregate, round1, summarize, Average, Collect, GroupKey};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::export::{BatchedExporter, ExportQuery, GroupBy, MergedTable, MetricRecord, MetricSpec, RollUp};
use crate::hierarchy::{select_outside_root, teams_at_configured_depth, Team};
use crate::periods::{parse_date_prefix, DateRange};
use crate::providers::{repository_names, LinearbClient};

pub const CYCLE_TIME: &str = "branch.computed.cycle_time";
pub const CODING_TIME: &str = "branch.time_to_pr";
pub const PICKUP_TIME: &str = "branch.time_to_review";
pub const REVIEW_TIME: &str = "branch.review_time";
pub const DEPLOY_TIME: &str = "branch.time_to_prod";

const P50_CYCLE_LABEL: &str = "Cycle Time (P50)";
const P75_CYCLE_LABEL: &str = "Cycle Time (P75)";

/// Row limit per team for the monthly dashboard export
const DASHBOARD_ROWS_PER_TEAM: usize = 12;
/// Dashboard month for records without a parseable period
pub const UNKNOWN_MONTH: &str = "Unknown";

/// Appended duration columns, paired with the metric column they render
const DHM_COLUMNS: [(&str, &str); 5] = [
    ("cycle_time_dhm", "branch.computed.cycle_time:p50"),
    ("coding_time_dhm", "branch.time_to_pr:p50"),
    ("pickup_time_dhm", "branch.time_to_review:p50"),
    ("review_time_dhm", "branch.review_time:p50"),
    ("deploy_time_dhm", "branch.time_to_prod:p50"),
];

const COLUMN_LABELS: [(&str, &str); 19] = [
    ("after", "Start Date"),
    ("before", "End Date"),
    ("team_id", "Team ID"),
    ("team_name", "Team Name"),
    ("repository_id", "Repository ID"),
    ("repository_name", "Repository Name"),
    ("repo_id", "Repository ID"),
    ("repo_name", "Repository Name"),
    ("branch.computed.cycle_time:p50", P50_CYCLE_LABEL),
    ("branch.computed.cycle_time:p75", P75_CYCLE_LABEL),
    ("branch.time_to_pr:p50", "Coding Time (P50)"),
    ("branch.time_to_review:p50", "Pickup Time (P50)"),
    ("branch.review_time:p50", "Review Time (P50)"),
    ("branch.time_to_prod:p50", "Deploy Time (P50)"),
    ("cycle_time_dhm", "Cycle Time (P50) - dhm"),
    ("coding_time_dhm", "Coding Time (P50) - dhm"),
    ("pickup_time_dhm", "Pickup Time (P50) - dhm"),
    ("review_time_dhm", "Review Time (P50) - dhm"),
    ("deploy_time_dhm", "Deploy Time (P50) - dhm"),
];

/// Requested metrics; repository exports add the P75 cycle time
pub fn metric_set(group_by: GroupBy) -> Vec<MetricSpec> {
    let mut metrics = vec![MetricSpec::p50(CYCLE_TIME)];
    if group_by == GroupBy::Repository {
        metrics.push(MetricSpec::p75(CYCLE_TIME));
    }
    metrics.extend([CODING_TIME, PICKUP_TIME, REVIEW_TIME, DEPLOY_TIME].map(MetricSpec::p50));
    metrics
}

/// Minutes as `"1d 2h 5m"`; the day part only when non-zero, the hour part
/// when it or the day part is non-zero. `None` renders empty.
pub fn minutes_to_dhm(minutes: Option<f64>) -> String {
    let Some(minutes) = minutes.filter(|m| m.is_finite()) else {
        return String::new();
    };
    let total = minutes.round() as i64;
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

/// Case-insensitive match against infrastructure name fragments
pub fn is_infra_repo(name: &str, patterns: &[String]) -> bool {
    let name = name.to_lowercase();
    patterns.iter().any(|p| name.contains(&p.to_lowercase()))
}

/// Export table with readable column labels and duration columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AugmentedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AugmentedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First of `names` present in the header, read from `row`
    pub fn value<'r>(&self, row: &'r [String], names: &[&str]) -> Option<&'r str> {
        names
            .iter()
            .find_map(|n| self.column_index(n))
            .and_then(|idx| row.get(idx))
            .map(String::as_str)
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| Error::internal(format!("CSV buffer: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| Error::internal(format!("CSV encoding: {}", e)))
    }
}

/// Exact header match first, then the first header containing `target`
fn find_column(header: &[String], target: &str) -> Option<usize> {
    header
        .iter()
        .position(|h| h == target)
        .or_else(|| header.iter().position(|h| h.contains(target)))
}

fn numeric_cell(row: &[String], idx: Option<usize>) -> Option<f64> {
    row.get(idx?).and_then(|v| v.trim().parse().ok())
}

/// Append duration columns, insert repository names when known, relabel
pub fn augment(table: &MergedTable, repo_names: Option<&HashMap<String, String>>) -> Result<AugmentedTable> {
    let (header, rows) = table.cells()?;

    let dhm_sources: Vec<Option<usize>> = DHM_COLUMNS
        .iter()
        .map(|(_, metric)| find_column(&header, metric))
        .collect();

    let repo_id_col = find_column(&header, "repository_id");
    let name_insert = match (repo_names, repo_id_col) {
        (Some(names), Some(idx)) if find_column(&header, "repository_name").is_none() => Some((names, idx)),
        _ => None,
    };

    let mut columns = header.clone();
    if let Some((_, idx)) = name_insert {
        columns.insert(idx + 1, "repository_name".to_string());
    }
    columns.extend(DHM_COLUMNS.iter().map(|(name, _)| name.to_string()));

    let rows = rows
        .into_iter()
        .map(|row| {
            let durations: Vec<String> = dhm_sources
                .iter()
                .map(|idx| minutes_to_dhm(numeric_cell(&row, *idx)))
                .collect();

            let mut out = row.clone();
            if let Some((names, idx)) = name_insert {
                let name = row
                    .get(idx)
                    .and_then(|id| names.get(id.trim()))
                    .cloned()
                    .unwrap_or_default();
                let at = (idx + 1).min(out.len());
                out.insert(at, name);
            }
            out.extend(durations);
            out
        })
        .collect();

    let labels: HashMap<&str, &str> = COLUMN_LABELS.into_iter().collect();
    let columns = columns
        .into_iter()
        .map(|c| labels.get(c.as_str()).map_or(c.clone(), |l| l.to_string()))
        .collect();

    Ok(AugmentedTable { columns, rows })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CycleTimeStats {
    /// Mean of positive P50 values, 0 when there are none
    pub p50_avg: f64,
    pub p75_avg: f64,
    /// Rows contributing a P50 value
    pub count: usize,
}

/// Average positive cycle times, optionally skipping infrastructure repos
pub fn cycle_time_stats(table: &AugmentedTable, exclude_patterns: Option<&[String]>) -> CycleTimeStats {
    let rows: Vec<&Vec<String>> = table
        .rows
        .iter()
        .filter(|row| match exclude_patterns {
            Some(patterns) => {
                let name = table
                    .value(row, &["Repository Name", "repository_name", "repo_name"])
                    .unwrap_or_default();
                !is_infra_repo(name, patterns)
            }
            None => true,
        })
        .collect();

    let positive = |names: &[&str]| -> Vec<f64> {
        rows.iter()
            .filter_map(|row| table.value(row, names))
            .filter_map(|v| v.trim().parse::<f64>().ok())
            .filter(|v| *v > 0.0)
            .collect()
    };

    let p50 = positive(&[P50_CYCLE_LABEL, "branch.computed.cycle_time:p50"]);
    let p75 = positive(&[P75_CYCLE_LABEL, "branch.computed.cycle_time:p75"]);
    CycleTimeStats {
        p50_avg: crate::aggregate::mean(&p50).unwrap_or(0.0),
        p75_avg: crate::aggregate::mean(&p75).unwrap_or(0.0),
        count: p50.len(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Population {
    /// Teams at the configured depth under the root
    Teams,
    /// Teams not reachable from the root
    OtherTeams,
    Repositories,
}

impl Population {
    pub fn group_by(&self) -> GroupBy {
        match self {
            Population::Teams | Population::OtherTeams => GroupBy::Team,
            Population::Repositories => GroupBy::Repository,
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            Population::Teams => "cycle_time_teams",
            Population::OtherTeams => "cycle_time_other_teams",
            Population::Repositories => "cycle_time_repositories",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleTimeReport {
    pub population: Population,
    pub range: DateRange,
    pub entities: usize,
    pub summary: AugmentedTable,
    /// Per-day rows, when requested and the provider had any
    pub daily: Option<AugmentedTable>,
    pub stats: CycleTimeStats,
    /// Repository populations only
    pub stats_excluding_infra: Option<CycleTimeStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardEntry {
    pub team_name: String,
    pub month: String,
    pub month_display: String,
    pub cycle_time_minutes: f64,
    pub coding_time_minutes: f64,
    pub pickup_time_minutes: f64,
    pub review_time_minutes: f64,
    pub deploy_time_minutes: f64,
    pub cycle_time_dhm: String,
    pub coding_time_dhm: String,
    pub pickup_time_dhm: String,
    pub review_time_dhm: String,
    pub deploy_time_dhm: String,
}

impl DashboardEntry {
    /// Records whose period does not parse land in the [`UNKNOWN_MONTH`] bucket
    fn from_record(record: &MetricRecord) -> Self {
        let (month, month_display) = match parse_date_prefix(&record.period) {
            Some(start) => (start.format("%Y-%m").to_string(), start.format("%b %Y").to_string()),
            None => (UNKNOWN_MONTH.to_string(), UNKNOWN_MONTH.to_string()),
        };
        let minutes = |metric: &str| record.field(&MetricSpec::p50(metric).column()).unwrap_or(0.0);
        let (cycle, coding, pickup, review, deploy) = (
            minutes(CYCLE_TIME),
            minutes(CODING_TIME),
            minutes(PICKUP_TIME),
            minutes(REVIEW_TIME),
            minutes(DEPLOY_TIME),
        );
        let team_name = if record.entity_name.is_empty() {
            record.entity_id.clone()
        } else {
            record.entity_name.clone()
        };

        Self {
            team_name,
            month,
            month_display,
            cycle_time_minutes: cycle,
            coding_time_minutes: coding,
            pickup_time_minutes: pickup,
            review_time_minutes: review,
            deploy_time_minutes: deploy,
            cycle_time_dhm: minutes_to_dhm(Some(cycle)),
            coding_time_dhm: minutes_to_dhm(Some(coding)),
            pickup_time_dhm: minutes_to_dhm(Some(pickup)),
            review_time_dhm: minutes_to_dhm(Some(review)),
            deploy_time_dhm: minutes_to_dhm(Some(deploy)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthGroup {
    pub month: String,
    pub month_display: String,
    pub teams: Vec<DashboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_data_points: usize,
    pub teams_count: usize,
    pub months_count: usize,
    pub avg_cycle_time_minutes: f64,
    pub avg_cycle_time_dhm: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub generated_at: String,
    pub date_range: DashboardRange,
    pub teams: Vec<String>,
    pub months: Vec<String>,
    /// Ordered by month, then team
    pub monthly_data: Vec<DashboardEntry>,
    pub by_team: BTreeMap<String, Vec<DashboardEntry>>,
    pub by_month: Vec<MonthGroup>,
    pub summary: DashboardSummary,
}

impl Dashboard {
    pub fn build(range: &DateRange, records: &[MetricRecord]) -> Self {
        let mut entries: Vec<DashboardEntry> = records.iter().map(DashboardEntry::from_record).collect();
        entries.sort_by(|a, b| {
            (GroupKey::period(&a.month), GroupKey::name(&a.team_name))
                .cmp(&(GroupKey::period(&b.month), GroupKey::name(&b.team_name)))
        });

        let by_team_groups = aggregate(&entries, |e| GroupKey::name(&e.team_name), &Collect);
        let by_month_groups = aggregate(&entries, |e| GroupKey::period(&e.month), &Collect);

        let teams: Vec<String> = by_team_groups.keys().map(GroupKey::label).collect();
        let months: Vec<String> = by_month_groups.keys().map(GroupKey::label).collect();

        let by_month = by_month_groups
            .into_iter()
            .map(|(key, group)| MonthGroup {
                month: key.label(),
                month_display: group.value.first().map(|e| e.month_display.clone()).unwrap_or_default(),
                teams: group.value,
            })
            .collect();
        let by_team = by_team_groups
            .into_iter()
            .map(|(key, group)| (key.label(), group.value))
            .collect();

        let avg = summarize(
            &entries,
            &Average(|e: &DashboardEntry| Some(e.cycle_time_minutes).filter(|m| *m > 0.0)),
        )
        .value;

        Self {
            generated_at: Utc::now().to_rfc3339(),
            date_range: DashboardRange {
                start: range.after.to_string(),
                end: range.before.to_string(),
            },
            summary: DashboardSummary {
                total_data_points: entries.len(),
                teams_count: teams.len(),
                months_count: months.len(),
                avg_cycle_time_minutes: avg.map(round1).unwrap_or(0.0),
                avg_cycle_time_dhm: minutes_to_dhm(avg),
            },
            teams,
            months,
            monthly_data: entries,
            by_team,
            by_month,
        }
    }
}

/// One row per entity per day of the window
fn daily_rows(range: &DateRange) -> usize {
    usize::try_from(range.days()).unwrap_or(1).max(1)
}

pub struct CycleTimePipeline<'a> {
    client: &'a LinearbClient,
    config: &'a Config,
}

impl<'a> CycleTimePipeline<'a> {
    pub fn new(client: &'a LinearbClient, config: &'a Config) -> Self {
        Self { client, config }
    }

    /// Window from optional `YYYY-MM-DD` bounds, defaulting to the last
    /// `cycle_time.default_days_back` days
    pub fn date_range(&self, after: Option<&str>, before: Option<&str>, today: NaiveDate) -> Result<DateRange> {
        DateRange::resolve(after, before, today, self.config.cycle_time.default_days_back)
    }

    async fn teams(&self, population: Population) -> Result<Vec<Team>> {
        let teams = self.client.list_teams().await?;
        let (resolved, selected) = teams_at_configured_depth(teams, &self.config.hierarchy, None, None)?;
        Ok(match population {
            Population::OtherTeams => select_outside_root(&resolved),
            _ => selected,
        })
    }

    /// Ids to export, batch size, and the repository name map if any
    async fn population(&self, population: Population) -> Result<(Vec<String>, usize, Option<HashMap<String, String>>)> {
        match population {
            Population::Teams | Population::OtherTeams => {
                let teams = self.teams(population).await?;
                let ids = teams.into_iter().map(|t| t.id).collect();
                Ok((ids, self.config.linearb.team_batch_size, None))
            }
            Population::Repositories => {
                let repositories = self.client.list_repositories().await?;
                let names = repository_names(&repositories);
                let ids = repositories.into_iter().map(|r| r.id).collect();
                Ok((ids, self.config.linearb.repository_batch_size, Some(names)))
            }
        }
    }

    pub async fn run(&self, population: Population, range: DateRange, daily: bool) -> Result<CycleTimeReport> {
        let (ids, batch_size, names) = self.population(population).await?;
        if ids.is_empty() {
            return Err(Error::no_data(format!("No {} to export", population.group_by())));
        }
        log::info!(
            "[cycle_time] Exporting {} {} ids for {}",
            ids.len(),
            population.group_by(),
            range
        );

        let group_by = population.group_by();
        let exporter = BatchedExporter::new(self.client);

        let query = ExportQuery::new(group_by, RollUp::Custom, metric_set(group_by), range);
        let table = exporter.export(&ids, &query, batch_size).await?;
        let summary = augment(&table, names.as_ref())?;

        let daily = if daily {
            let query = ExportQuery::new(group_by, RollUp::Day, metric_set(group_by), range)
                .with_rows_per_entity(daily_rows(&range));
            match exporter.export(&ids, &query, batch_size).await {
                Ok(table) => Some(augment(&table, names.as_ref())?),
                Err(e) if e.is_no_data() => {
                    log::warn!("[cycle_time] No daily data for {}", range);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let stats = cycle_time_stats(&summary, None);
        let stats_excluding_infra = (population == Population::Repositories)
            .then(|| cycle_time_stats(&summary, Some(&self.config.cycle_time.infra_patterns)));

        Ok(CycleTimeReport {
            population,
            range,
            entities: ids.len(),
            summary,
            daily,
            stats,
            stats_excluding_infra,
        })
    }

    /// Monthly P50 breakdown per team over the last `dashboard_months` months
    pub async fn dashboard(&self, today: NaiveDate) -> Result<Dashboard> {
        let range = DateRange::last_months(today, self.config.cycle_time.dashboard_months)?;
        let ids: Vec<String> = self
            .teams(Population::Teams)
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();

        let query = ExportQuery::new(GroupBy::Team, RollUp::Month, metric_set(GroupBy::Team), range)
            .with_rows_per_entity(DASHBOARD_ROWS_PER_TEAM);
        let records = match BatchedExporter::new(self.client)
            .export(&ids, &query, self.config.linearb.team_batch_size)
            .await
        {
            Ok(table) => table.records(GroupBy::Team)?,
            Err(e) if e.is_no_data() => {
                log::warn!("[cycle_time] No dashboard data for {}", range);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let dashboard = Dashboard::build(&range, &records);
        log::info!(
            "[cycle_time] Dashboard: {} data points, {} teams, {} months",
            dashboard.summary.total_data_points,
            dashboard.summary.teams_count,
            dashboard.summary.months_count
        );
        Ok(dashboard)
    }
}

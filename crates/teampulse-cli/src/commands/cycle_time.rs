//! Cycle time commands
//!
//! `export` writes the augmented summary (and optionally daily) CSV for
//! one population; `dashboard` writes the monthly per-team JSON.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use tabled::Tabled;

use super::{today, Context};
use crate::output::{print_json, print_output, print_report, print_success, SummaryRow};
use teampulse_core::metrics::cycle_time::{minutes_to_dhm, CycleTimePipeline, CycleTimeReport, DashboardEntry, Population};

#[derive(Subcommand)]
pub enum CycleTimeAction {
    /// Export cycle time breakdowns for teams, other teams or repositories
    Export(ExportArgs),

    /// Monthly per-team cycle time dashboard
    Dashboard,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Group by repository instead of team
    #[arg(long, conflicts_with = "other_teams")]
    by_repo: bool,

    /// Export teams outside the configured root
    #[arg(long)]
    other_teams: bool,

    /// Also export per-day rows
    #[arg(long)]
    daily: bool,

    /// Window start, YYYY-MM-DD (inclusive)
    #[arg(long, env = "DATE_AFTER")]
    after: Option<String>,

    /// Window end, YYYY-MM-DD (exclusive)
    #[arg(long, env = "DATE_BEFORE")]
    before: Option<String>,
}

impl ExportArgs {
    fn population(&self) -> Population {
        if self.by_repo {
            Population::Repositories
        } else if self.other_teams {
            Population::OtherTeams
        } else {
            Population::Teams
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct DashboardRow {
    #[tabled(rename = "Month")]
    pub month: String,
    #[tabled(rename = "Team")]
    pub team: String,
    #[tabled(rename = "Cycle Time")]
    pub cycle_time: String,
    #[tabled(rename = "Coding")]
    pub coding: String,
    #[tabled(rename = "Pickup")]
    pub pickup: String,
    #[tabled(rename = "Review")]
    pub review: String,
    #[tabled(rename = "Deploy")]
    pub deploy: String,
}

impl From<&DashboardEntry> for DashboardRow {
    fn from(entry: &DashboardEntry) -> Self {
        let dhm = |minutes: f64| minutes_to_dhm(Some(minutes));
        Self {
            month: entry.month_display.clone(),
            team: entry.team_name.clone(),
            cycle_time: entry.cycle_time_dhm.clone(),
            coding: dhm(entry.coding_time_minutes),
            pickup: dhm(entry.pickup_time_minutes),
            review: dhm(entry.review_time_minutes),
            deploy: dhm(entry.deploy_time_minutes),
        }
    }
}

pub async fn execute(ctx: &Context, action: CycleTimeAction) -> Result<()> {
    match action {
        CycleTimeAction::Export(args) => export(ctx, args).await,
        CycleTimeAction::Dashboard => dashboard(ctx).await,
    }
}

async fn export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let client = ctx.linearb()?;
    let pipeline = CycleTimePipeline::new(&client, &ctx.config);
    let range = pipeline.date_range(args.after.as_deref(), args.before.as_deref(), today())?;
    let population = args.population();

    let report = pipeline.run(population, range, args.daily).await?;

    let suffix = format!("{}_{}", range.after, range.inclusive_end());
    ctx.write_artifact(
        &format!("{}_{}.csv", population.file_stem(), suffix),
        &report.summary.to_csv()?,
    )?;
    if let Some(daily) = &report.daily {
        ctx.write_artifact(&format!("{}_daily_{}.csv", population.file_stem(), suffix), &daily.to_csv()?)?;
    }

    print_report(&report, &summary_rows(&report), ctx.format)?;
    print_success("Cycle time export complete", ctx.quiet);
    Ok(())
}

fn summary_rows(report: &CycleTimeReport) -> Vec<SummaryRow> {
    let mut rows = vec![
        SummaryRow::new(
            "Window",
            format!("{} to {}", report.range.after, report.range.inclusive_end()),
        ),
        SummaryRow::new("Entities", report.entities),
        SummaryRow::new("Rows", report.summary.len()),
        SummaryRow::new("Avg cycle time (P50)", minutes_to_dhm(Some(report.stats.p50_avg))),
    ];
    if report.population == Population::Repositories {
        rows.push(SummaryRow::new("Avg cycle time (P75)", minutes_to_dhm(Some(report.stats.p75_avg))));
    }
    if let Some(filtered) = &report.stats_excluding_infra {
        rows.push(SummaryRow::new(
            "Avg cycle time (P50), excluding infra",
            minutes_to_dhm(Some(filtered.p50_avg)),
        ));
        rows.push(SummaryRow::new("Repositories excluding infra", filtered.count));
    }
    if let Some(daily) = &report.daily {
        rows.push(SummaryRow::new("Daily rows", daily.len()));
    }
    rows
}

async fn dashboard(ctx: &Context) -> Result<()> {
    let client = ctx.linearb()?;
    let dashboard = CycleTimePipeline::new(&client, &ctx.config).dashboard(today()).await?;

    ctx.write_json("cycle_time_dashboard.json", &dashboard)?;

    match ctx.format {
        crate::output::OutputFormat::Json => print_json(&dashboard)?,
        crate::output::OutputFormat::Table => {
            let rows: Vec<DashboardRow> = dashboard.monthly_data.iter().map(DashboardRow::from).collect();
            print_output(&rows, ctx.format)?;
            print_success(
                &format!(
                    "{} teams over {} months, average cycle time {}",
                    dashboard.summary.teams_count, dashboard.summary.months_count, dashboard.summary.avg_cycle_time_dhm
                ),
                ctx.quiet,
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: ExportArgs,
    }

    #[test]
    fn test_population_flags() {
        let parse = |argv: &[&str]| Harness::try_parse_from(argv).map(|h| h.args.population());
        assert_eq!(parse(&["t"]).unwrap(), Population::Teams);
        assert_eq!(parse(&["t", "--by-repo"]).unwrap(), Population::Repositories);
        assert_eq!(parse(&["t", "--other-teams"]).unwrap(), Population::OtherTeams);
        assert!(parse(&["t", "--by-repo", "--other-teams"]).is_err());
    }
}

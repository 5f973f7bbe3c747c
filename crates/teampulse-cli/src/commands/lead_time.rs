//! Lead time command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{or_dash, print_json, print_output, print_success, OutputFormat};
use teampulse_core::metrics::lead_time::{LeadTimeDataset, LeadTimePipeline};
use teampulse_core::metrics::to_csv;

#[derive(Args)]
pub struct LeadTimeArgs {
    /// Epic search (defaults to lead_time.jql)
    #[arg(long)]
    jql: Option<String>,
}

/// One fiscal quarter of one scope
#[derive(Debug, Serialize, Tabled)]
pub struct QuarterRow {
    #[tabled(rename = "Scope")]
    pub scope: String,
    #[tabled(rename = "Quarter")]
    pub quarter: String,
    #[tabled(rename = "Epics")]
    pub epics: usize,
    #[tabled(rename = "Avg (days)")]
    pub avg_days: String,
    #[tabled(rename = "Median (days)")]
    pub median_days: String,
    #[tabled(rename = "Avg")]
    pub avg_readable: String,
}

fn quarter_rows(dataset: &LeadTimeDataset) -> Vec<QuarterRow> {
    dataset
        .by_quarter
        .iter()
        .map(|q| QuarterRow {
            scope: dataset.name.clone(),
            quarter: q.quarter.clone(),
            epics: q.summary.total_epics,
            avg_days: or_dash(q.summary.avg_lead_time_days),
            median_days: or_dash(q.summary.median_lead_time_days),
            avg_readable: q.summary.avg_lead_time_readable.clone(),
        })
        .collect()
}

pub async fn execute(ctx: &Context, args: LeadTimeArgs) -> Result<()> {
    let client = ctx.jira()?;
    let report = LeadTimePipeline::new(&client, &ctx.config).run(args.jql.as_deref()).await?;

    ctx.write_json("lead_time_report.json", &report)?;
    ctx.write_artifact("lead_time_epics.csv", &to_csv(report.epics())?)?;

    match ctx.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<QuarterRow> = report.datasets.iter().flat_map(quarter_rows).collect();
            print_output(&rows, ctx.format)?;
            if let Some(dataset) = report.dataset(report.default_scope) {
                print_success(
                    &format!(
                        "{}: {} epics, {} with lead time, average {}",
                        dataset.name,
                        dataset.summary.total_epics,
                        dataset.summary.epics_with_lead_time,
                        dataset.summary.avg_lead_time_readable
                    ),
                    ctx.quiet,
                );
            }
        }
    }
    Ok(())
}

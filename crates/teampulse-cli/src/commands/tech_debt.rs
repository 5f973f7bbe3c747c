//! Tech debt command

use anyhow::Result;
use serde::Serialize;
use tabled::Tabled;

use super::{today, Context};
use crate::output::{print_json, print_output, OutputFormat};
use teampulse_core::metrics::tech_debt::{QuarterSummary, TechDebtPipeline};

#[derive(Debug, Serialize, Tabled)]
pub struct QuarterRow {
    #[tabled(rename = "Quarter")]
    pub quarter: String,
    #[tabled(rename = "Start")]
    pub start: u64,
    #[tabled(rename = "Resolved")]
    pub resolved: u64,
    #[tabled(rename = "Created")]
    pub created: u64,
    #[tabled(rename = "End")]
    pub end: u64,
    #[tabled(rename = "Net")]
    pub net_change: i64,
}

impl From<&QuarterSummary> for QuarterRow {
    fn from(summary: &QuarterSummary) -> Self {
        Self {
            quarter: summary.quarter.clone(),
            start: summary.totals.total_start,
            resolved: summary.totals.total_resolved,
            created: summary.totals.total_created,
            end: summary.totals.total_end,
            net_change: summary.totals.net_change,
        }
    }
}

pub async fn execute(ctx: &Context) -> Result<()> {
    let client = ctx.jira()?;
    let report = TechDebtPipeline::new(&client, &ctx.config).run(today()).await?;

    ctx.write_json("tech_debt_report.json", &report)?;
    ctx.write_artifact("tech_debt.csv", &report.to_csv()?)?;

    match ctx.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<QuarterRow> = report.summary.iter().map(QuarterRow::from).collect();
            print_output(&rows, ctx.format)?;
        }
    }
    Ok(())
}

//! Tech module command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{or_dash, print_json, print_output, print_success, OutputFormat};
use teampulse_core::aggregate::round1;
use teampulse_core::metrics::tech_module::{EpicShare, TechModulePipeline};

#[derive(Args)]
pub struct TechModuleArgs {
    /// Epic search (defaults to tech_module.jql)
    #[arg(long)]
    jql: Option<String>,

    /// Minimum focus share in percent (defaults to tech_module.min_pct)
    #[arg(long)]
    min_pct: Option<f64>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct EpicRow {
    #[tabled(rename = "Epic")]
    pub key: String,
    #[tabled(rename = "Summary")]
    pub summary: String,
    #[tabled(rename = "Estimate (pw)")]
    pub total_pw: f64,
    #[tabled(rename = "Focus (pw)")]
    pub focus_pw: f64,
    #[tabled(rename = "Focus %")]
    pub pct: f64,
}

impl From<&EpicShare> for EpicRow {
    fn from(epic: &EpicShare) -> Self {
        Self {
            key: epic.issue_key.clone(),
            summary: epic.summary.clone(),
            total_pw: epic.total_estimate_pw,
            focus_pw: epic.tech_module_pw,
            pct: epic.tech_module_pct,
        }
    }
}

pub async fn execute(ctx: &Context, args: TechModuleArgs) -> Result<()> {
    let client = ctx.jira()?;
    let report = TechModulePipeline::new(&client, &ctx.config)
        .run(args.jql.as_deref(), args.min_pct)
        .await?;

    ctx.write_artifact("tech_module_epics.csv", &report.to_csv()?)?;

    match ctx.format {
        OutputFormat::Json => print_json(&report.above_threshold())?,
        OutputFormat::Table => {
            let rows: Vec<EpicRow> = report.above_threshold().into_iter().map(EpicRow::from).collect();
            print_output(&rows, ctx.format)?;
            print_success(
                &format!(
                    "{} epics at or above {}%, {} below, average share {}%",
                    rows.len(),
                    report.min_pct,
                    report.below_threshold_count(),
                    or_dash(report.average_above_threshold().map(round1))
                ),
                ctx.quiet,
            );
        }
    }
    Ok(())
}

//! Incident command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use super::{today, Context};
use crate::output::{print_json, print_output, print_success, OutputFormat};
use teampulse_core::metrics::incidents::{IncidentPipeline, TeamIncidents};

#[derive(Args)]
pub struct IncidentArgs {
    /// Incident search (defaults to incidents.jql)
    #[arg(long)]
    jql: Option<String>,
}

#[derive(Debug, Serialize, Tabled)]
pub struct TeamRow {
    #[tabled(rename = "Team")]
    pub team: String,
    #[tabled(rename = "Incidents")]
    pub total: usize,
    #[tabled(rename = "By Quarter")]
    pub by_quarter: String,
}

impl From<&TeamIncidents> for TeamRow {
    fn from(team: &TeamIncidents) -> Self {
        let by_quarter: Vec<String> = team
            .by_quarter
            .iter()
            .map(|q| format!("{}: {}", q.label, q.count))
            .collect();
        Self {
            team: team.team.clone(),
            total: team.total,
            by_quarter: by_quarter.join(", "),
        }
    }
}

pub async fn execute(ctx: &Context, args: IncidentArgs) -> Result<()> {
    let client = ctx.jira()?;
    let report = IncidentPipeline::new(&client, &ctx.config)
        .run(args.jql.as_deref(), today())
        .await?;

    ctx.write_json("incidents_summary.json", &report)?;
    ctx.write_artifact("incidents_by_team_quarter.csv", &report.to_csv()?)?;
    ctx.write_artifact("incidents_detailed.csv", &report.detailed_csv()?)?;

    match ctx.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<TeamRow> = report.teams.iter().map(TeamRow::from).collect();
            print_output(&rows, ctx.format)?;
            print_success(
                &format!(
                    "{} incidents across {} teams and {} quarters",
                    report.summary.total_incidents, report.summary.total_teams, report.summary.total_quarters
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
    use teampulse_core::metrics::incidents::LabelCount;

    #[test]
    fn test_team_row_lists_quarters() {
        let team = TeamIncidents {
            team: "Payments".to_string(),
            total: 3,
            by_quarter: vec![
                LabelCount { label: "2024 Q1".to_string(), count: 1 },
                LabelCount { label: "2024 Q2".to_string(), count: 2 },
            ],
        };
        let row = TeamRow::from(&team);
        assert_eq!(row.by_quarter, "2024 Q1: 1, 2024 Q2: 2");
        assert_eq!(row.total, 3);
    }
}

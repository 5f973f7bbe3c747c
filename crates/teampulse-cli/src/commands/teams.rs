//! Team commands
//!
//! Lists LinearB teams resolved under the configured root.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{or_dash, print_output};
use teampulse_core::hierarchy::{select_outside_root, teams_at_configured_depth};
use teampulse_core::metrics::to_csv;
use teampulse_core::Team;

#[derive(Subcommand)]
pub enum TeamsAction {
    /// List teams at a depth under the root
    List {
        /// Depth below the root (defaults to hierarchy.depth)
        #[arg(long)]
        depth: Option<u32>,

        /// Root team name (defaults to hierarchy.root_name)
        #[arg(long)]
        root: Option<String>,

        /// List teams outside the root's subtree instead
        #[arg(long)]
        other: bool,
    },
}

/// Team row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct TeamRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Depth")]
    pub depth: String,
    #[tabled(rename = "Path")]
    pub path: String,
}

impl From<&Team> for TeamRow {
    fn from(team: &Team) -> Self {
        Self {
            id: team.id.clone(),
            name: team.name.clone(),
            depth: or_dash(team.depth),
            path: team.path.join(" / "),
        }
    }
}

pub async fn execute(ctx: &Context, action: TeamsAction) -> Result<()> {
    match action {
        TeamsAction::List { depth, root, other } => list_teams(ctx, depth, root.as_deref(), other).await,
    }
}

async fn list_teams(ctx: &Context, depth: Option<u32>, root: Option<&str>, other: bool) -> Result<()> {
    let client = ctx.linearb()?;
    let teams = client.list_teams().await?;
    let (resolved, selected) = teams_at_configured_depth(teams, &ctx.config.hierarchy, root, depth)?;

    let teams = if other { select_outside_root(&resolved) } else { selected };
    let rows = write_team_artifacts(ctx, &teams)?;
    print_output(&rows, ctx.format)
}

fn write_team_artifacts(ctx: &Context, teams: &[Team]) -> Result<Vec<TeamRow>> {
    let rows: Vec<TeamRow> = teams.iter().map(TeamRow::from).collect();
    ctx.write_json("linearb_teams.json", &teams)?;
    ctx.write_artifact("linearb_teams.csv", &to_csv(&rows)?)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_context;
    use teampulse_core::Config;
    use tempfile::TempDir;

    #[test]
    fn test_team_row() {
        let mut team = Team::new("7", "Web", Some("1"));
        let row = TeamRow::from(&team);
        assert_eq!(row.depth, "-");
        assert_eq!(row.path, "");

        team.depth = Some(2);
        team.path = vec!["Org".to_string(), "Eng".to_string(), "Web".to_string()];
        let row = TeamRow::from(&team);
        assert_eq!(row.depth, "2");
        assert_eq!(row.path, "Org / Eng / Web");
    }

    #[test]
    fn test_team_artifacts_written() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().to_path_buf();
        let ctx = test_context(config);

        let mut team = Team::new("7", "Web", Some("1"));
        team.path = vec!["Org".to_string(), "Web".to_string()];
        let rows = write_team_artifacts(&ctx, &[team]).unwrap();
        assert_eq!(rows.len(), 1);

        let csv = std::fs::read_to_string(dir.path().join("linearb_teams.csv")).unwrap();
        assert_eq!(csv, "id,name,depth,path\n7,Web,-,Org / Web\n");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("linearb_teams.json")).unwrap()).unwrap();
        assert_eq!(json[0]["id"], "7");
        assert_eq!(json[0]["parent_id"], "1");
    }
}

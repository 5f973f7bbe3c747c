//! Repository commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::print_output;
use teampulse_core::metrics::to_csv;
use teampulse_core::Repository;

#[derive(Subcommand)]
pub enum ReposAction {
    /// List repositories across all services
    List,
}

#[derive(Debug, Serialize, Tabled)]
pub struct RepoRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Service")]
    pub service: String,
}

impl From<&Repository> for RepoRow {
    fn from(repo: &Repository) -> Self {
        Self {
            id: repo.id.clone(),
            name: repo.name.clone(),
            service: repo.service_name.clone(),
        }
    }
}

pub async fn execute(ctx: &Context, action: ReposAction) -> Result<()> {
    match action {
        ReposAction::List => {
            let repositories = ctx.linearb()?.list_repositories().await?;
            let rows = write_repository_artifacts(ctx, &repositories)?;
            print_output(&rows, ctx.format)
        }
    }
}

fn write_repository_artifacts(ctx: &Context, repositories: &[Repository]) -> Result<Vec<RepoRow>> {
    let rows: Vec<RepoRow> = repositories.iter().map(RepoRow::from).collect();
    ctx.write_json("linearb_repositories.json", &repositories)?;
    ctx.write_artifact("linearb_repositories.csv", &to_csv(&rows)?)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_context;
    use teampulse_core::Config;
    use tempfile::TempDir;

    #[test]
    fn test_repository_artifacts_written() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().join("out");
        let ctx = test_context(config);

        let repositories = vec![Repository {
            id: "100".to_string(),
            name: "pay-api".to_string(),
            service_id: Some("10".to_string()),
            service_name: "payments".to_string(),
        }];
        write_repository_artifacts(&ctx, &repositories).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("out/linearb_repositories.csv")).unwrap();
        assert_eq!(csv, "id,name,service\n100,pay-api,payments\n");
        let json = std::fs::read_to_string(dir.path().join("out/linearb_repositories.json")).unwrap();
        let parsed: Vec<Repository> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, repositories);
    }
}

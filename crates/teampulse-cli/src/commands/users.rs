//! User commands

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::print_output;
use teampulse_core::metrics::to_csv;
use teampulse_core::providers::LinearbUser;

#[derive(Subcommand)]
pub enum UsersAction {
    /// List users
    List {
        /// Include deleted users
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Serialize, Tabled)]
pub struct UserRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Email")]
    pub email: String,
    #[tabled(rename = "Teams")]
    pub teams: String,
    #[tabled(rename = "Active")]
    pub active: bool,
}

impl From<&LinearbUser> for UserRow {
    fn from(user: &LinearbUser) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            teams: user.teams.join(", "),
            active: user.active,
        }
    }
}

pub async fn execute(ctx: &Context, action: UsersAction) -> Result<()> {
    match action {
        UsersAction::List { all } => {
            let users: Vec<LinearbUser> = ctx
                .linearb()?
                .list_users()
                .await?
                .into_iter()
                .filter(|u| all || u.active)
                .collect();
            let rows = write_user_artifacts(ctx, &users)?;
            print_output(&rows, ctx.format)
        }
    }
}

fn write_user_artifacts(ctx: &Context, users: &[LinearbUser]) -> Result<Vec<UserRow>> {
    let rows: Vec<UserRow> = users.iter().map(UserRow::from).collect();
    ctx.write_json("linearb_users.json", &users)?;
    ctx.write_artifact("linearb_users.csv", &to_csv(&rows)?)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_context;
    use teampulse_core::Config;
    use tempfile::TempDir;

    #[test]
    fn test_user_artifacts_written() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().to_path_buf();
        let ctx = test_context(config);

        let users = vec![LinearbUser {
            id: "5".to_string(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            login: "ana".to_string(),
            active: true,
            teams: vec!["Web".to_string(), "Core".to_string()],
        }];
        let rows = write_user_artifacts(&ctx, &users).unwrap();
        assert_eq!(rows[0].teams, "Web, Core");

        let csv = std::fs::read_to_string(dir.path().join("linearb_users.csv")).unwrap();
        assert_eq!(csv, "id,name,email,teams,active\n5,Ana,ana@example.com,\"Web, Core\",true\n");
        assert!(dir.path().join("linearb_users.json").exists());
    }
}

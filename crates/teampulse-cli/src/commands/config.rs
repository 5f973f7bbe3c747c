//! Config commands
//!
//! Show the effective configuration and where it was loaded from.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_json, print_output, print_info, OutputFormat};
use teampulse_core::config::{get_config_path, CONFIG_PATH_ENV};
use teampulse_core::http::mask_secret;
use teampulse_core::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Print the config file location
    Path,
}

/// Config row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl ConfigRow {
    fn new(key: &str, value: impl ToString) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx),
        ConfigAction::Path => {
            print_info(&config_path(ctx), false);
            Ok(())
        }
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => print_json(&ctx.config),
        OutputFormat::Table => {
            let mut rows = vec![ConfigRow::new("config_path", config_path(ctx))];
            rows.extend(config_rows(&ctx.config));
            rows.push(ConfigRow::new("LINEARB_API_KEY", secret_state(ctx.linearb_api_key.as_deref())));
            rows.push(ConfigRow::new("JIRA_API_KEY", secret_state(ctx.jira_api_key.as_deref())));
            print_output(&rows, ctx.format)
        }
    }
}

fn config_path(ctx: &Context) -> String {
    match &ctx.config_path {
        Some(path) => path.display().to_string(),
        None => get_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| format!("Unknown (set {})", CONFIG_PATH_ENV)),
    }
}

fn secret_state(secret: Option<&str>) -> String {
    match secret.filter(|s| !s.is_empty()) {
        Some(s) => mask_secret(s),
        None => "Not set".to_string(),
    }
}

fn config_rows(config: &Config) -> Vec<ConfigRow> {
    let or_unset = |value: &str| {
        if value.is_empty() {
            "Not set".to_string()
        } else {
            value.to_string()
        }
    };

    vec![
        ConfigRow::new("linearb.base_url", &config.linearb.base_url),
        ConfigRow::new("linearb.page_size", config.linearb.page_size),
        ConfigRow::new(
            "linearb.batch_sizes",
            format!(
                "teams {}, repositories {}",
                config.linearb.team_batch_size, config.linearb.repository_batch_size
            ),
        ),
        ConfigRow::new("jira.base_url", or_unset(&config.jira.base_url)),
        ConfigRow::new("jira.auth_type", format!("{:?}", config.jira.auth_type).to_lowercase()),
        ConfigRow::new(
            "hierarchy.root_name",
            or_unset(config.hierarchy.root_name.as_deref().unwrap_or_default()),
        ),
        ConfigRow::new("hierarchy.depth", config.hierarchy.depth),
        ConfigRow::new("hierarchy.exclusion_file", config.hierarchy.exclusion_file.display()),
        ConfigRow::new("retry.max_attempts", config.retry.max_attempts),
        ConfigRow::new(
            "quarters",
            if config.quarters.is_empty() {
                "generated".to_string()
            } else {
                config.quarters.iter().map(|q| q.name.as_str()).collect::<Vec<_>>().join(", ")
            },
        ),
        ConfigRow::new("fiscal.start_month", config.fiscal.start_month),
        ConfigRow::new("fiscal.grace_days", config.fiscal.grace_days),
        ConfigRow::new("cycle_time.default_days_back", config.cycle_time.default_days_back),
        ConfigRow::new("tech_debt.teams", config.tech_debt.teams.len()),
        ConfigRow::new("tech_module.min_pct", config.tech_module.min_pct),
        ConfigRow::new("output_dir", or_unset(&config.output_dir.display().to_string())),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_state_masks_keys() {
        assert_eq!(secret_state(None), "Not set");
        assert_eq!(secret_state(Some("")), "Not set");
        assert_ne!(secret_state(Some("lb-key-1234567890")), "lb-key-1234567890");
    }

    #[test]
    fn test_config_rows_defaults() {
        let rows = config_rows(&Config::default());
        let value = |key: &str| rows.iter().find(|r| r.key == key).map(|r| r.value.clone()).unwrap();
        assert_eq!(value("jira.base_url"), "Not set");
        assert_eq!(value("quarters"), "generated");
        assert_eq!(value("tech_module.min_pct"), "50");
    }
}

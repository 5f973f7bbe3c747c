//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod config;
pub mod cycle_time;
pub mod incidents;
pub mod lead_time;
pub mod repos;
pub mod teams;
pub mod tech_debt;
pub mod tech_module;
pub mod users;

use anyhow::{anyhow, Context as _, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;

use crate::output::{print_info, OutputFormat};
use teampulse_core::{Config, JiraClient, LinearbClient, RequestClient};

/// Directory used when the config leaves `output_dir` empty
const DEFAULT_OUTPUT_DIR: &str = "output";

/// Shared context for all commands
pub struct Context {
    pub config: Config,
    pub config_path: Option<PathBuf>,
    pub format: OutputFormat,
    pub quiet: bool,
    pub linearb_api_key: Option<String>,
    pub jira_api_key: Option<String>,
}

impl Context {
    pub fn linearb(&self) -> Result<LinearbClient> {
        let key = required_secret(self.linearb_api_key.as_deref(), "LINEARB_API_KEY")?;
        let client = RequestClient::from_settings(&self.config.retry)?;
        log::debug!("[cli] LinearB client for {}", self.config.linearb.base_url);
        Ok(LinearbClient::new(&self.config.linearb, client, key)?)
    }

    pub fn jira(&self) -> Result<JiraClient> {
        let token = required_secret(self.jira_api_key.as_deref(), "JIRA_API_KEY")?;
        let client = RequestClient::from_settings(&self.config.retry)?;
        log::debug!("[cli] Jira client for {}", self.config.jira.base_url);
        Ok(JiraClient::new(&self.config.jira, client, token)?)
    }

    pub fn output_dir(&self) -> PathBuf {
        if self.config.output_dir.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_OUTPUT_DIR)
        } else {
            self.config.output_dir.clone()
        }
    }

    /// Write `contents` to `output_dir/name`, creating the directory
    pub fn write_artifact(&self, name: &str, contents: &str) -> Result<PathBuf> {
        let dir = self.output_dir();
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(name);
        std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        print_info(&format!("Wrote {}", path.display()), self.quiet);
        Ok(path)
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        self.write_artifact(name, &serde_json::to_string_pretty(value)?)
    }
}

fn required_secret<'a>(value: Option<&'a str>, env: &str) -> Result<&'a str> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("{} is not set", env))
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

#[cfg(test)]
pub(crate) fn test_context(config: Config) -> Context {
    Context {
        config,
        config_path: None,
        format: OutputFormat::Table,
        quiet: true,
        linearb_api_key: None,
        jira_api_key: Some("   ".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_credentials() {
        let ctx = test_context(Config::default());
        let err = ctx.linearb().err().unwrap();
        assert_eq!(err.to_string(), "LINEARB_API_KEY is not set");

        let err = ctx.jira().err().unwrap();
        assert_eq!(err.to_string(), "JIRA_API_KEY is not set");
    }

    #[test]
    fn test_output_dir_default() {
        let ctx = test_context(Config::default());
        assert_eq!(ctx.output_dir(), PathBuf::from("output"));
    }

    #[test]
    fn test_write_artifact_creates_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().join("reports");
        let ctx = test_context(config);

        let path = ctx.write_artifact("a.csv", "x,y\n").unwrap();
        assert_eq!(path, dir.path().join("reports").join("a.csv"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "x,y\n");
    }
}

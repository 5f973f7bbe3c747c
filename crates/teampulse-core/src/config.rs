//! Configuration
//!
//! One immutable value loaded from JSON and threaded into every component.
//! Credentials are not part of it; they come from the environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::http::{JiraAuthType, RetryPolicy};
use crate::periods::{validate_quarters, QuarterDef};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "TEAMPULSE_CONFIG";
pub const CONFIG_FILE_NAME: &str = "teampulse.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub linearb: LinearbConfig,
    pub jira: JiraConfig,
    pub hierarchy: HierarchyConfig,
    pub retry: RetrySettings,
    /// Explicit calendar quarters; empty means generated defaults
    pub quarters: Vec<QuarterDef>,
    pub fiscal: FiscalSettings,
    pub cycle_time: CycleTimeConfig,
    pub lead_time: LeadTimeConfig,
    pub incidents: IncidentConfig,
    pub tech_debt: TechDebtConfig,
    pub tech_module: TechModuleConfig,
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearbConfig {
    pub base_url: String,
    pub page_size: usize,
    pub team_batch_size: usize,
    pub repository_batch_size: usize,
}

impl Default for LinearbConfig {
    fn default() -> Self {
        Self {
            base_url: "https://public-api.linearb.io".to_string(),
            page_size: 50,
            team_batch_size: 50,
            repository_batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraConfig {
    /// Server root, e.g. `https://jira.example.com/jira`
    pub base_url: String,
    pub auth_type: JiraAuthType,
    pub email: Option<String>,
    pub page_size: usize,
    /// Default cap on issues returned by one search
    pub max_results: usize,
    pub fields: JiraFields,
    pub focus: FocusTeams,
}

impl Default for JiraConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_type: JiraAuthType::Bearer,
            email: None,
            page_size: 100,
            max_results: 1000,
            fields: JiraFields::default(),
            focus: FocusTeams::default(),
        }
    }
}

impl JiraConfig {
    pub fn api_base(&self) -> String {
        format!("{}/rest/api/2", self.base_url.trim_end_matches('/'))
    }
}

/// Custom field ids used by the Jira pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JiraFields {
    pub prd_start_date: String,
    pub release_date: String,
    pub tech_team: String,
    pub qa_team: String,
    /// Additional role fields; any populated one qualifies an issue
    pub role_fields: Vec<String>,
    pub epic_link: String,
}

impl Default for JiraFields {
    fn default() -> Self {
        Self {
            prd_start_date: "customfield_15410".to_string(),
            release_date: "customfield_10613".to_string(),
            tech_team: "customfield_16028".to_string(),
            qa_team: "customfield_16032".to_string(),
            role_fields: vec!["customfield_16911".to_string(), "customfield_16029".to_string()],
            epic_link: "customfield_10101".to_string(),
        }
    }
}

/// The group of teams a report focuses on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusTeams {
    pub tech_teams: Vec<String>,
    pub qa_teams: Vec<String>,
    pub pm_emails: Vec<String>,
    pub designer_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    pub root_name: Option<String>,
    pub depth: u32,
    /// Names excluded on first discovery (trimmed, case-insensitive)
    pub excluded_names: Vec<String>,
    pub exclusion_file: PathBuf,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root_name: None,
            depth: 2,
            excluded_names: Vec::new(),
            exclusion_file: PathBuf::from("excluded_team_ids.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_backoff_ms: policy.initial_backoff.as_millis() as u64,
            max_backoff_ms: policy.max_backoff.as_millis() as u64,
            timeout_secs: crate::http::transport::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiscalSettings {
    pub grace_days: u32,
    /// Calendar month (1-12) the fiscal year starts in
    pub start_month: u32,
}

impl Default for FiscalSettings {
    fn default() -> Self {
        Self {
            grace_days: 10,
            start_month: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleTimeConfig {
    pub default_days_back: i64,
    pub dashboard_months: u32,
    /// Repository name fragments treated as infrastructure
    pub infra_patterns: Vec<String>,
}

impl Default for CycleTimeConfig {
    fn default() -> Self {
        let infra_patterns = [
            "k8s", "kubernetes", "kube-", "-kube", "helm", "argocd", "argo-cd", "flux", "istio",
            "envoy", "ingress", "terraform", "infra", "gitops", "deploy", "manifest",
        ];
        Self {
            default_days_back: 30,
            dashboard_months: 6,
            infra_patterns: infra_patterns.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadTimeConfig {
    pub jql: String,
}

impl Default for LeadTimeConfig {
    fn default() -> Self {
        Self {
            jql: "issuetype = Epic AND status = Done".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IncidentConfig {
    pub jql: String,
    pub max_results: usize,
    /// Raw tech-team value to display name
    pub team_names: BTreeMap<String, String>,
}

impl Default for IncidentConfig {
    fn default() -> Self {
        Self {
            jql: "issuetype = Incident".to_string(),
            max_results: 5000,
            team_names: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechDebtTeam {
    pub name: String,
    pub epic_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TechDebtConfig {
    pub teams: Vec<TechDebtTeam>,
    pub issue_types: Vec<String>,
}

impl Default for TechDebtConfig {
    fn default() -> Self {
        Self {
            teams: Vec::new(),
            issue_types: ["Story", "Task", "Sub-task", "Bug"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TechModuleConfig {
    pub jql: String,
    pub min_pct: f64,
    pub child_issue_type: String,
    pub epic_batch_size: usize,
    pub child_max_results: usize,
}

impl Default for TechModuleConfig {
    fn default() -> Self {
        Self {
            jql: "issuetype = Epic".to_string(),
            min_pct: 50.0,
            child_issue_type: "Roadmap".to_string(),
            epic_batch_size: 100,
            child_max_results: 5000,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (get_config_path()?, false),
        };

        if !path.exists() {
            if explicit {
                return Err(Error::config(format!("Config file not found: {}", path.display())));
            }
            log::debug!("[config] {} not found, using defaults", path.display());
            return Ok(Self::default().resolved());
        }

        log::info!("[config] Loading {}", path.display());
        let text = std::fs::read_to_string(&path)?;
        let config: Config = serde_json::from_str(&text)
            .map_err(|e| Error::config(format!("Invalid config {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config.resolved())
    }

    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("linearb.page_size", self.linearb.page_size),
            ("linearb.team_batch_size", self.linearb.team_batch_size),
            ("linearb.repository_batch_size", self.linearb.repository_batch_size),
            ("jira.page_size", self.jira.page_size),
            ("tech_module.epic_batch_size", self.tech_module.epic_batch_size),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(Error::config(format!("{} must be greater than 0", name)));
            }
        }

        if !(1..=12).contains(&self.fiscal.start_month) {
            return Err(Error::config(format!(
                "fiscal.start_month must be 1-12, got {}",
                self.fiscal.start_month
            )));
        }

        validate_quarters(&self.quarters)
    }

    /// Expand `~` in path settings
    fn resolved(mut self) -> Self {
        self.hierarchy.exclusion_file = expand_home(&self.hierarchy.exclusion_file);
        self.output_dir = expand_home(&self.output_dir);
        self
    }
}

/// Config file location: `TEAMPULSE_CONFIG`, else the platform config dir
pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Ok(PathBuf::from(path));
    }

    let dirs = directories::ProjectDirs::from("com", "teampulse", "Teampulse")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
}

/// Replace a leading `~` with the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // Mutex to ensure env var tests don't run in parallel
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.linearb.page_size, 50);
        assert_eq!(config.linearb.team_batch_size, 50);
        assert_eq!(config.linearb.repository_batch_size, 10);
        assert_eq!(config.jira.page_size, 100);
        assert_eq!(config.hierarchy.depth, 2);
        assert_eq!(config.fiscal.grace_days, 10);
        assert_eq!(config.fiscal.start_month, 4);
        assert_eq!(config.retry.timeout_secs, 30);
        assert_eq!(config.retry.policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"hierarchy": {"root_name": "Engineering", "depth": 1}, "jira": {"auth_type": "basic"}}"#,
        )
        .unwrap();
        assert_eq!(config.hierarchy.root_name.as_deref(), Some("Engineering"));
        assert_eq!(config.hierarchy.depth, 1);
        assert_eq!(config.hierarchy.exclusion_file, PathBuf::from("excluded_team_ids.json"));
        assert_eq!(config.jira.auth_type, JiraAuthType::Basic);
        assert_eq!(config.linearb.page_size, 50);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"linearb": {{"team_batch_size": 25}}, "output_dir": "out"}}"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.linearb.team_batch_size, 25);
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/teampulse.json"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let mut config = Config::default();
        config.linearb.repository_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_fiscal_month() {
        let mut config = Config::default();
        config.fiscal.start_month = 13;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_get_config_path_env_override() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::set_var(CONFIG_PATH_ENV, "/tmp/test_teampulse.json");
        let path = get_config_path().unwrap();
        assert_eq!(path.to_string_lossy(), "/tmp/test_teampulse.json");
        std::env::remove_var(CONFIG_PATH_ENV);
    }

    #[test]
    fn test_get_config_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var(CONFIG_PATH_ENV);
        let path = get_config_path().unwrap();
        assert!(path.to_string_lossy().ends_with(CONFIG_FILE_NAME));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home(Path::new("relative/file.json")), PathBuf::from("relative/file.json"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/x.json")), home.join("x.json"));
        }
    }

    #[test]
    fn test_jira_api_base() {
        let mut jira = JiraConfig::default();
        jira.base_url = "https://jira.example.com/jira/".to_string();
        assert_eq!(jira.api_base(), "https://jira.example.com/jira/rest/api/2");
    }
}

//! Jira REST API client
//!
//! JQL search through the pager, count-only queries, and typed access to
//! the loosely shaped field payloads Jira returns.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::JiraConfig;
use crate::error::{Error, Result};
use crate::http::{ApiAuth, RequestClient};
use crate::pager::{JqlSearch, Pager};
use crate::periods::normalize_date;

/// One field value, by the shape Jira sent it in
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    /// Select-style object; carries its `value`, else its `name`
    Option(String),
    /// Multi-select or list of scalars
    List(Vec<FieldValue>),
    Number(f64),
    /// Anything else, rendered as JSON text
    Other(String),
}

impl FieldValue {
    /// `None` for null and for empty lists
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(FieldValue::Text(s.clone())),
            Value::Number(n) => Some(
                n.as_f64()
                    .map(FieldValue::Number)
                    .unwrap_or_else(|| FieldValue::Other(n.to_string())),
            ),
            Value::Object(obj) => {
                let label = ["value", "name"]
                    .iter()
                    .filter_map(|k| obj.get(*k).and_then(Value::as_str))
                    .find(|s| !s.is_empty());
                Some(match label {
                    Some(label) => FieldValue::Option(label.to_string()),
                    None => FieldValue::Other(value.to_string()),
                })
            }
            Value::Array(items) => {
                let list: Vec<FieldValue> = items.iter().filter_map(FieldValue::from_json).collect();
                if list.is_empty() {
                    None
                } else {
                    Some(FieldValue::List(list))
                }
            }
            Value::Bool(b) => Some(FieldValue::Other(b.to_string())),
        }
    }

    /// Human-readable text; list entries joined with `", "`
    pub fn display(&self) -> String {
        match self {
            FieldValue::Text(s) | FieldValue::Option(s) | FieldValue::Other(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::List(items) => items
                .iter()
                .map(FieldValue::display)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Individual entries: the list members, or the value itself
    pub fn entries(&self) -> Vec<String> {
        match self {
            FieldValue::List(items) => items.iter().map(FieldValue::display).collect(),
            other => vec![other.display()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub key: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Issue {
    /// Parse search results, skipping entries without a key
    pub fn from_values(values: Vec<Value>) -> Vec<Self> {
        values
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<Issue>(v) {
                Ok(issue) => Some(issue),
                Err(e) => {
                    log::warn!("[jira] Skipping malformed issue: {}", e);
                    None
                }
            })
            .collect()
    }

    pub fn field(&self, id: &str) -> Option<FieldValue> {
        self.fields.get(id).and_then(FieldValue::from_json)
    }

    /// Display text of a field, `None` when unset or blank
    pub fn field_text(&self, id: &str) -> Option<String> {
        self.field(id).map(|v| v.display()).filter(|s| !s.is_empty())
    }

    /// A date or timestamp field as `YYYY-MM-DD`, empty when unset
    pub fn date(&self, id: &str) -> String {
        normalize_date(self.field_text(id).as_deref())
    }

    /// Name of an object-valued field such as `status` or `priority`
    pub fn name_of(&self, id: &str) -> String {
        match self.fields.get(id) {
            Some(Value::Object(obj)) => obj
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    pub fn summary(&self) -> String {
        self.fields
            .get("summary")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn number(&self, id: &str) -> Option<f64> {
        self.fields.get(id).and_then(Value::as_f64)
    }

    fn assignee(&self) -> Option<&Map<String, Value>> {
        self.fields.get("assignee").and_then(Value::as_object)
    }

    /// `emailAddress`, falling back to the user `name` then `key`
    pub fn assignee_email(&self) -> Option<String> {
        let assignee = self.assignee()?;
        ["emailAddress", "name", "key"]
            .iter()
            .filter_map(|k| assignee.get(*k).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn assignee_name(&self) -> String {
        self.assignee()
            .and_then(|a| {
                ["displayName", "name"]
                    .iter()
                    .filter_map(|k| a.get(*k).and_then(Value::as_str))
                    .find(|s| !s.is_empty())
            })
            .unwrap_or_default()
            .to_string()
    }

    pub fn parent_key(&self) -> Option<String> {
        self.fields
            .get("parent")
            .and_then(|p| p.get("key"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

pub struct JiraClient {
    search_url: String,
    page_size: usize,
    client: RequestClient,
    headers: HeaderMap,
}

impl JiraClient {
    pub fn new(config: &JiraConfig, client: RequestClient, token: &str) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(Error::config("jira.base_url is not set"));
        }
        let auth = ApiAuth::jira(config.auth_type, token, config.email.as_deref())?;

        Ok(Self {
            search_url: format!("{}/search", config.api_base()),
            page_size: config.page_size,
            client,
            headers: auth.headers()?,
        })
    }

    /// Issues matching `jql`, at most `max_results`
    pub async fn search(&self, jql: &str, fields: &[String], max_results: usize) -> Result<Vec<Issue>> {
        log::info!("[jira] Searching: {}", jql);
        let search = JqlSearch::new(&self.search_url, &self.headers, jql, fields);
        let values = Pager::new(&self.client)
            .fetch_with(&search, self.page_size, Some(max_results))
            .await?;
        let issues = Issue::from_values(values);
        log::info!("[jira] {} issues", issues.len());
        Ok(issues)
    }

    /// Number of issues matching `jql`, without fetching them
    pub async fn count(&self, jql: &str) -> Result<u64> {
        let search = JqlSearch::new(&self.search_url, &self.headers, jql, &[]);
        let response = self.client.request(search.count_request()).await?;
        let body: Value = response.json()?;
        Ok(body.get("total").and_then(Value::as_u64).unwrap_or(0))
    }
}

/// `"a", "b"` style list for JQL `IN (...)` clauses, inner quotes escaped
pub fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockTransport;
    use crate::http::{JiraAuthType, RetryPolicy};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> JiraConfig {
        JiraConfig {
            base_url: "https://jira.test/jira/".to_string(),
            ..JiraConfig::default()
        }
    }

    fn client(mock: &Arc<MockTransport>) -> JiraClient {
        let request_client = RequestClient::new(mock.clone(), RetryPolicy::with_unit(Duration::from_millis(1)));
        JiraClient::new(&config(), request_client, "pat-token").unwrap()
    }

    fn issue(fields: Value) -> Issue {
        serde_json::from_value(json!({"key": "ENG-1", "fields": fields})).unwrap()
    }

    #[test]
    fn test_field_value_shapes() {
        assert_eq!(FieldValue::from_json(&json!("Core")), Some(FieldValue::Text("Core".into())));
        assert_eq!(
            FieldValue::from_json(&json!({"value": "Payments", "id": "1"})).unwrap().display(),
            "Payments"
        );
        assert_eq!(FieldValue::from_json(&json!({"name": "High"})).unwrap().display(), "High");
        assert_eq!(
            FieldValue::from_json(&json!([{"value": "A"}, "B", 3])).unwrap().display(),
            "A, B, 3"
        );
        assert_eq!(FieldValue::from_json(&json!([])), None);
        assert_eq!(FieldValue::from_json(&Value::Null), None);
        assert_eq!(FieldValue::from_json(&json!(7200)).unwrap().display(), "7200");
    }

    #[test]
    fn test_field_entries() {
        let value = FieldValue::from_json(&json!([{"value": "A"}, {"value": "B"}])).unwrap();
        assert_eq!(value.entries(), vec!["A", "B"]);
        assert_eq!(FieldValue::Text("x".into()).entries(), vec!["x"]);
    }

    #[test]
    fn test_issue_accessors() {
        let issue = issue(json!({
            "summary": "Checkout revamp",
            "status": {"name": "In Progress"},
            "created": "2024-05-02T10:11:12.000+0900",
            "customfield_1": {"value": "Core"},
            "assignee": {"name": "ana", "displayName": "Ana"},
            "parent": {"key": "ENG-0"},
            "timeoriginalestimate": 144000
        }));

        assert_eq!(issue.summary(), "Checkout revamp");
        assert_eq!(issue.name_of("status"), "In Progress");
        assert_eq!(issue.name_of("priority"), "");
        assert_eq!(issue.date("created"), "2024-05-02");
        assert_eq!(issue.date("resolutiondate"), "");
        assert_eq!(issue.field_text("customfield_1").as_deref(), Some("Core"));
        assert_eq!(issue.assignee_email().as_deref(), Some("ana"));
        assert_eq!(issue.assignee_name(), "Ana");
        assert_eq!(issue.parent_key().as_deref(), Some("ENG-0"));
        assert_eq!(issue.number("timeoriginalestimate"), Some(144000.0));
    }

    #[tokio::test]
    async fn test_search_pages_and_skips_malformed() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({"issues": [{"key": "ENG-1", "fields": {}}, {"fields": {}}], "total": 2}),
        );

        let issues = client(&mock).search("project = ENG", &["summary".to_string()], 1000).await.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].key, "ENG-1");

        let request = &mock.requests()[0];
        assert_eq!(request.url, "https://jira.test/jira/rest/api/2/search");
        assert_eq!(request.headers.get("authorization").unwrap(), "Bearer pat-token");
        assert_eq!(request.body.as_ref().unwrap()["maxResults"], 100);
    }

    #[tokio::test]
    async fn test_count() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"issues": [], "total": 42}));
        assert_eq!(client(&mock).count("project = ENG").await.unwrap(), 42);
        assert_eq!(mock.requests()[0].body.as_ref().unwrap()["maxResults"], 0);
    }

    #[test]
    fn test_basic_auth_requires_email() {
        let mock = Arc::new(MockTransport::new());
        let request_client = RequestClient::new(mock, RetryPolicy::default());
        let config = JiraConfig {
            auth_type: JiraAuthType::Basic,
            ..config()
        };
        assert!(matches!(
            JiraClient::new(&config, request_client, "token"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_missing_base_url() {
        let mock = Arc::new(MockTransport::new());
        let request_client = RequestClient::new(mock, RetryPolicy::default());
        assert!(JiraClient::new(&JiraConfig::default(), request_client, "t").is_err());
    }

    #[test]
    fn test_quoted_list() {
        assert_eq!(quoted_list(&["Story".into(), "Sub-task".into()]), "\"Story\", \"Sub-task\"");
    }

    #[test]
    fn test_quoted_list_escapes_quotes() {
        assert_eq!(
            quoted_list(&["Team \"A\"".into(), "C:\\ops".into()]),
            r#""Team \"A\"", "C:\\ops""#
        );
    }
}

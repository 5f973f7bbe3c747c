//! LinearB REST API client
//!
//! Teams, repositories (via services), users and CSV measurement exports.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::config::LinearbConfig;
use crate::error::{Error, Result};
use crate::export::{ExportQuery, ExportSource};
use crate::hierarchy::team::id_of;
use crate::hierarchy::Team;
use crate::http::{ApiAuth, HttpRequest, RequestClient};
use crate::pager::Pager;

const TEAMS_PATH: &str = "/api/v2/teams";
const SERVICES_PATH: &str = "/api/v1/services";
const USERS_PATH: &str = "/api/v1/users";
const EXPORT_PATH: &str = "/api/v2/measurements/export";

/// Team fields that may carry member objects
const MEMBER_FIELDS: [&str; 4] = ["contributors", "members", "users", "team_members"];

/// A repository discovered through a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub service_id: Option<String>,
    pub service_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearbUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub login: String,
    pub active: bool,
    pub teams: Vec<String>,
}

impl LinearbUser {
    fn from_value(value: &Value) -> Option<Self> {
        let id = ["id", "contributor_id", "user_id"]
            .iter()
            .filter_map(|k| value.get(*k))
            .find_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })?;

        let text = |keys: &[&str]| -> String {
            keys.iter()
                .filter_map(|k| value.get(*k).and_then(Value::as_str))
                .find(|s| !s.is_empty())
                .unwrap_or_default()
                .to_string()
        };

        let teams = value
            .get("team_membership")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|t| match t {
                        Value::String(s) => Some(s.clone()),
                        Value::Object(_) => ["name", "team_name"]
                            .iter()
                            .filter_map(|k| t.get(*k).and_then(Value::as_str))
                            .find(|s| !s.is_empty())
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            id,
            name: text(&["name", "display_name"]),
            email: text(&["email"]),
            login: text(&["login", "username"]),
            active: value.get("deleted_at").map_or(true, Value::is_null),
            teams,
        })
    }
}

pub struct LinearbClient {
    base_url: String,
    page_size: usize,
    client: RequestClient,
    headers: HeaderMap,
}

impl LinearbClient {
    pub fn new(config: &LinearbConfig, client: RequestClient, api_key: &str) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            client,
            headers: ApiAuth::linearb(api_key).headers()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        log::info!("[linearb] Fetching teams");
        let items = Pager::new(&self.client)
            .fetch_all(&self.url(TEAMS_PATH), &self.headers, self.page_size)
            .await?;
        let teams = Team::from_values(&items);
        log::info!("[linearb] {} teams", teams.len());
        Ok(teams)
    }

    /// Repositories listed under each service's `paths` (or `repositories`),
    /// first occurrence of each id kept
    pub async fn list_repositories(&self) -> Result<Vec<Repository>> {
        log::info!("[linearb] Fetching repositories via services");
        let services = Pager::new(&self.client)
            .fetch_all(&self.url(SERVICES_PATH), &self.headers, self.page_size)
            .await?;

        let mut seen = HashSet::new();
        let mut repositories = Vec::new();
        for service in &services {
            let service_id = id_of(service);
            let service_name = service
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            for repo in service_repositories(service) {
                let Some(id) = id_of(repo) else { continue };
                if !seen.insert(id.clone()) {
                    continue;
                }
                repositories.push(Repository {
                    id,
                    name: repo
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    service_id: service_id.clone(),
                    service_name: service_name.clone(),
                });
            }
        }

        log::info!(
            "[linearb] {} unique repositories across {} services",
            repositories.len(),
            services.len()
        );
        Ok(repositories)
    }

    /// Users, deduplicated by id (pages may repeat entries)
    ///
    /// Keys without access to the users endpoint get a client error there;
    /// members are then collected from the team listing instead.
    pub async fn list_users(&self) -> Result<Vec<LinearbUser>> {
        log::info!("[linearb] Fetching users");
        let items = match Pager::new(&self.client)
            .fetch_all(&self.url(USERS_PATH), &self.headers, self.page_size)
            .await
        {
            Ok(items) => items,
            Err(Error::Fatal { status, .. }) if (400..500).contains(&status) => {
                log::warn!(
                    "[linearb] No access to {} (HTTP {}), extracting contributors from teams",
                    USERS_PATH,
                    status
                );
                return self.users_from_teams().await;
            }
            Err(e) => return Err(e),
        };

        let mut seen = HashSet::new();
        let users: Vec<LinearbUser> = items
            .iter()
            .filter_map(LinearbUser::from_value)
            .filter(|u| seen.insert(u.id.clone()))
            .collect();

        log::info!(
            "[linearb] {} unique users ({} records returned)",
            users.len(),
            items.len()
        );
        Ok(users)
    }

    async fn users_from_teams(&self) -> Result<Vec<LinearbUser>> {
        let teams = Pager::new(&self.client)
            .fetch_all(&self.url(TEAMS_PATH), &self.headers, self.page_size)
            .await?;
        let users = members_of_teams(&teams);
        log::info!(
            "[linearb] {} unique contributors across {} teams",
            users.len(),
            teams.len()
        );
        Ok(users)
    }
}

/// Members found under any of [`MEMBER_FIELDS`], first occurrence kept,
/// with every team they appear in
fn members_of_teams(teams: &[Value]) -> Vec<LinearbUser> {
    let mut users: Vec<LinearbUser> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for team in teams {
        let team_name = team
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown Team");

        let members = MEMBER_FIELDS
            .iter()
            .filter_map(|field| team.get(*field).and_then(Value::as_array))
            .flatten()
            .filter(|m| m.is_object())
            .filter_map(LinearbUser::from_value);

        for mut member in members {
            match index.get(&member.id) {
                Some(&i) => {
                    if !users[i].teams.iter().any(|t| t == team_name) {
                        users[i].teams.push(team_name.to_string());
                    }
                }
                None => {
                    member.teams = vec![team_name.to_string()];
                    index.insert(member.id.clone(), users.len());
                    users.push(member);
                }
            }
        }
    }
    users
}

#[async_trait]
impl ExportSource for LinearbClient {
    async fn export_batch(&self, ids: &[String], query: &ExportQuery) -> Result<Option<String>> {
        let request = HttpRequest::post(self.url(EXPORT_PATH), query.payload(ids)?)
            .headers(&self.headers)
            .query("file_format", "csv");
        let response = self.client.request(request).await?;

        if response.is_no_content() {
            return Ok(None);
        }

        let body: Value = response.json()?;
        let report_url = match body.get("report_url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                log::warn!("[linearb] Export response carried no report_url");
                return Ok(None);
            }
        };

        // report URLs are pre-signed, so no credentials are sent
        let report = self.client.request(HttpRequest::get(report_url)).await?;
        Ok(Some(report.text()))
    }
}

fn service_repositories(service: &Value) -> Vec<&Value> {
    ["paths", "repositories"]
        .iter()
        .filter_map(|key| service.get(*key).and_then(Value::as_array))
        .find(|list| !list.is_empty())
        .map(|list| list.iter().filter(|r| r.is_object()).collect())
        .unwrap_or_default()
}

/// Repository id to name, for enriching exported tables
pub fn repository_names(repositories: &[Repository]) -> HashMap<String, String> {
    repositories
        .iter()
        .map(|r| (r.id.clone(), r.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{GroupBy, MetricSpec, RollUp};
    use crate::http::mock::MockTransport;
    use crate::http::auth::API_KEY_HEADER;
    use crate::http::RetryPolicy;
    use crate::periods::DateRange;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn client(mock: &Arc<MockTransport>) -> LinearbClient {
        let request_client = RequestClient::new(mock.clone(), RetryPolicy::with_unit(Duration::from_millis(1)));
        LinearbClient::new(&LinearbConfig::default(), request_client, "lb-key-1234567890").unwrap()
    }

    fn query() -> ExportQuery {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
        )
        .unwrap();
        ExportQuery::new(GroupBy::Team, RollUp::Custom, vec![MetricSpec::p50("branch.time_to_pr")], range)
    }

    #[tokio::test]
    async fn test_list_teams_sends_api_key() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"items": [{"id": 1, "name": "Org"}, {"id": 2, "name": "Web", "parent_id": 1}], "total": 2}));

        let teams = client(&mock).list_teams().await.unwrap();
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[1].parent_id.as_deref(), Some("1"));

        let request = &mock.requests()[0];
        assert_eq!(request.url, "https://public-api.linearb.io/api/v2/teams");
        assert_eq!(request.headers.get(API_KEY_HEADER).unwrap(), "lb-key-1234567890");
    }

    #[tokio::test]
    async fn test_repositories_deduplicated_across_services() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({
                "items": [
                    {"id": 10, "name": "payments", "paths": [{"id": 100, "name": "pay-api"}, {"id": 101, "name": "pay-web"}]},
                    {"id": 11, "name": "shared", "paths": [], "repositories": [{"id": 100, "name": "pay-api"}, {"id": 102, "name": "infra-k8s"}]},
                    {"id": 12, "name": "empty"}
                ],
                "total": 3
            }),
        );

        let repos = client(&mock).list_repositories().await.unwrap();
        let ids: Vec<&str> = repos.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["100", "101", "102"]);
        assert_eq!(repos[0].service_name, "payments");
        assert_eq!(repos[2].service_id.as_deref(), Some("11"));
        assert_eq!(repository_names(&repos)["101"], "pay-web");
    }

    #[tokio::test]
    async fn test_users_deduplicated() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(
            200,
            json!({
                "items": [
                    {"id": 1, "name": "Ana", "email": "ana@example.com", "team_membership": [{"name": "Web"}, "Core"]},
                    {"id": 1, "name": "Ana again"},
                    {"id": 2, "display_name": "Bo", "username": "bo", "deleted_at": "2024-01-01"}
                ],
                "total": 3
            }),
        );

        let users = client(&mock).list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "Ana");
        assert_eq!(users[0].teams, vec!["Web", "Core"]);
        assert!(users[0].active);
        assert_eq!(users[1].name, "Bo");
        assert_eq!(users[1].login, "bo");
        assert!(!users[1].active);
    }

    #[tokio::test]
    async fn test_users_forbidden_falls_back_to_team_members() {
        let mock = Arc::new(MockTransport::new());
        mock.push_status(403);
        mock.push_json(
            200,
            json!({
                "items": [
                    {"id": 1, "name": "Web", "contributors": [{"id": 5, "name": "Ana", "email": "ana@example.com"}]},
                    {"id": 2, "name": "Core", "members": [{"id": 5, "name": "Ana"}, {"user_id": 6, "name": "Bo"}]},
                    {"id": 3, "name": "Ops", "team_members": [{"id": 6}], "users": [{"id": 6}]}
                ],
                "total": 3
            }),
        );

        let users = client(&mock).list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "5");
        assert_eq!(users[0].email, "ana@example.com");
        assert_eq!(users[0].teams, vec!["Web", "Core"]);
        assert_eq!(users[1].id, "6");
        assert_eq!(users[1].teams, vec!["Core", "Ops"]);

        let requests = mock.requests();
        assert!(requests[0].url.ends_with("/api/v1/users"));
        assert!(requests[1].url.ends_with("/api/v2/teams"));
    }

    #[tokio::test]
    async fn test_users_server_error_is_not_masked() {
        let mock = Arc::new(MockTransport::new());
        mock.push_status(501);

        let err = client(&mock).list_users().await.unwrap_err();
        assert!(matches!(err, Error::Fatal { status: 501, .. }));
        assert_eq!(mock.request_count(), 1);
    }

    #[tokio::test]
    async fn test_export_batch_downloads_report_without_auth() {
        let mock = Arc::new(MockTransport::new());
        mock.push_json(200, json!({"report_url": "https://reports.test/r1.csv"}));
        mock.push_text(200, "team_id,v\n1,2\n");

        let body = client(&mock)
            .export_batch(&["1".to_string()], &query())
            .await
            .unwrap();
        assert_eq!(body.as_deref(), Some("team_id,v\n1,2\n"));

        let requests = mock.requests();
        assert_eq!(requests[0].url, "https://public-api.linearb.io/api/v2/measurements/export");
        assert_eq!(requests[0].query_value("file_format"), Some("csv"));
        assert_eq!(requests[0].body.as_ref().unwrap()["team_ids"], json!([1]));
        assert_eq!(requests[1].url, "https://reports.test/r1.csv");
        assert!(requests[1].headers.get(API_KEY_HEADER).is_none());
    }

    #[tokio::test]
    async fn test_export_batch_no_content() {
        let mock = Arc::new(MockTransport::new());
        mock.push_status(204);
        mock.push_json(200, json!({}));

        let client = client(&mock);
        assert_eq!(client.export_batch(&["1".to_string()], &query()).await.unwrap(), None);
        assert_eq!(client.export_batch(&["2".to_string()], &query()).await.unwrap(), None);
        assert_eq!(mock.request_count(), 2);
    }
}

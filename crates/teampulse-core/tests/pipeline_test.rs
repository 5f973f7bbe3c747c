//! End-to-end pipeline tests over a scripted transport

use chrono::NaiveDate;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use teampulse_core::aggregate::Count;
use teampulse_core::http::mock::MockTransport;
use teampulse_core::metrics::cycle_time::{CycleTimePipeline, Population};
use teampulse_core::{
    aggregate, BatchedExporter, Config, DateRange, Error, ExportQuery, GroupBy, GroupKey, LinearbClient, MetricSpec,
    RequestClient, RetryPolicy, RollUp,
};

fn linearb(mock: &Arc<MockTransport>, config: &Config) -> LinearbClient {
    let client = RequestClient::new(mock.clone(), RetryPolicy::with_unit(Duration::from_millis(1)));
    LinearbClient::new(&config.linearb, client, "lb-test-key").unwrap()
}

fn june() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    )
    .unwrap()
}

fn org_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.hierarchy.root_name = Some("Org".to_string());
    config.hierarchy.depth = 1;
    config.hierarchy.excluded_names = vec!["QA".to_string()];
    config.hierarchy.exclusion_file = dir.path().join("excluded_teams.json");
    config
}

fn org_teams() -> serde_json::Value {
    json!({
        "items": [
            {"id": 1, "name": "Org"},
            {"id": 2, "name": "Web", "parent_id": 1},
            {"id": 3, "name": "core", "parent": {"id": 1}},
            {"id": 4, "name": "QA", "parent_id": 1},
            {"id": 5, "name": "Partner"}
        ],
        "total": 5
    })
}

#[tokio::test]
async fn test_team_cycle_time_export() {
    let dir = TempDir::new().unwrap();
    let config = org_config(&dir);
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, org_teams());
    mock.push_json(200, json!({"report_url": "https://reports.test/teams.csv"}));
    mock.push_text(
        200,
        "team_id,team_name,after,branch.computed.cycle_time:p50,branch.time_to_pr:p50\n\
         3,core,2024-06-01,1505,30\n\
         2,Web,2024-06-01,60,\n",
    );

    let client = linearb(&mock, &config);
    let report = CycleTimePipeline::new(&client, &config)
        .run(Population::Teams, june(), false)
        .await
        .unwrap();

    assert_eq!(report.entities, 2);
    assert_eq!(report.summary.len(), 2);
    assert!(report.daily.is_none());
    assert!(report.stats_excluding_infra.is_none());
    assert_eq!(report.stats.count, 2);
    assert_eq!(report.stats.p50_avg, 782.5);

    let row = &report.summary.rows[0];
    assert_eq!(report.summary.value(row, &["Team Name"]), Some("core"));
    assert_eq!(report.summary.value(row, &["Cycle Time (P50) - dhm"]), Some("1d 1h 5m"));

    // QA is discovered by name and persisted for later runs
    let persisted = std::fs::read_to_string(dir.path().join("excluded_teams.json")).unwrap();
    assert_eq!(persisted, r#"["4"]"#);

    let requests = mock.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].body.as_ref().unwrap()["team_ids"], json!([3, 2]));
}

#[tokio::test]
async fn test_other_teams_export_uses_unreachable_teams() {
    let dir = TempDir::new().unwrap();
    let config = org_config(&dir);
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, org_teams());
    mock.push_json(200, json!({"report_url": "https://reports.test/other.csv"}));
    mock.push_text(200, "team_id,team_name,branch.computed.cycle_time:p50\n5,Partner,90\n");

    let client = linearb(&mock, &config);
    let report = CycleTimePipeline::new(&client, &config)
        .run(Population::OtherTeams, june(), false)
        .await
        .unwrap();

    assert_eq!(report.entities, 1);
    assert_eq!(mock.requests()[1].body.as_ref().unwrap()["team_ids"], json!([5]));
}

#[tokio::test]
async fn test_repository_export_with_daily_and_infra_stats() {
    let config = Config::default();
    let mock = Arc::new(MockTransport::new());
    mock.push_json(
        200,
        json!({
            "items": [
                {"id": 10, "name": "payments", "paths": [{"id": 100, "name": "pay-api"}]},
                {"id": 11, "name": "platform", "paths": [{"id": 102, "name": "infra-k8s"}]}
            ],
            "total": 2
        }),
    );
    mock.push_json(200, json!({"report_url": "https://reports.test/repos.csv"}));
    mock.push_text(
        200,
        "repository_id,branch.computed.cycle_time:p50,branch.computed.cycle_time:p75\n\
         100,120,240\n\
         102,600,900\n",
    );
    // daily export has nothing
    mock.push_status(204);

    let client = linearb(&mock, &config);
    let report = CycleTimePipeline::new(&client, &config)
        .run(Population::Repositories, june(), true)
        .await
        .unwrap();

    assert_eq!(report.summary.columns[1], "Repository Name");
    assert_eq!(report.summary.rows[1][1], "infra-k8s");
    assert!(report.daily.is_none());
    assert_eq!(report.stats.count, 2);
    assert_eq!(report.stats.p50_avg, 360.0);

    let filtered = report.stats_excluding_infra.unwrap();
    assert_eq!(filtered.count, 1);
    assert_eq!(filtered.p50_avg, 120.0);
    assert_eq!(filtered.p75_avg, 240.0);
}

#[tokio::test]
async fn test_batched_export_skips_empty_batches() {
    let config = Config::default();
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"report_url": "https://reports.test/b1.csv"}));
    mock.push_text(200, "team_id,team_name,after,branch.time_to_pr:p50\n1,Web,2024-06-01,10\n1,Web,2024-07-01,20\n");
    mock.push_status(204);
    mock.push_json(200, json!({"report_url": "https://reports.test/b3.csv"}));
    mock.push_text(200, "team_id,team_name,after,branch.time_to_pr:p50\n3,Core,2024-06-01,5\n");

    let client = linearb(&mock, &config);
    let query = ExportQuery::new(
        GroupBy::Team,
        RollUp::Month,
        vec![MetricSpec::p50("branch.time_to_pr")],
        june(),
    );
    let ids: Vec<String> = ["1", "2", "3"].iter().map(|s| s.to_string()).collect();
    let table = BatchedExporter::new(&client).export(&ids, &query, 1).await.unwrap();
    assert_eq!(table.row_count(), 3);

    let records = table.records(GroupBy::Team).unwrap();
    let per_team = aggregate(&records, |r| GroupKey::name(&r.entity_name), &Count);
    let counts: Vec<(String, usize)> = per_team.iter().map(|(k, s)| (k.label(), s.count)).collect();
    assert_eq!(counts, vec![("Core".to_string(), 1), ("Web".to_string(), 2)]);
}

#[tokio::test]
async fn test_mismatched_batch_headers_abort_export() {
    let config = Config::default();
    let mock = Arc::new(MockTransport::new());
    mock.push_json(200, json!({"report_url": "https://reports.test/b1.csv"}));
    mock.push_text(200, "team_id,a\n1,2\n");
    mock.push_json(200, json!({"report_url": "https://reports.test/b2.csv"}));
    mock.push_text(200, "team_id,b\n2,3\n");

    let client = linearb(&mock, &config);
    let query = ExportQuery::new(GroupBy::Team, RollUp::Custom, vec![MetricSpec::p50("a")], june());
    let ids = vec!["1".to_string(), "2".to_string()];
    let err = BatchedExporter::new(&client).export(&ids, &query, 1).await.unwrap_err();

    assert!(matches!(err, Error::SchemaMismatch { batch: 2, .. }));
}

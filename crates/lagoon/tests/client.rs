use std::time::Duration;

use handler::{BackupRecordStore, EnvironmentName, RecordStoreError, SnapshotId};
use lagoon::{LagoonClient, LagoonConfig};
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn client_for(server: &MockServer) -> LagoonClient {
    LagoonClient::new(LagoonConfig {
        endpoint: format!("{}/graphql", server.uri()),
        audience: "api.dev".to_string(),
        token_signing_key: "super-secret-string".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn env(name: &str) -> EnvironmentName {
    EnvironmentName::new(name).unwrap()
}

#[tokio::test]
async fn query_returns_recorded_backups() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({
            "variables": { "openshiftProjectName": "project-main" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "environmentByOpenshiftProjectName": {
                    "id": 12,
                    "name": "main",
                    "openshiftProjectName": "project-main",
                    "backups": [
                        { "id": 1, "backupId": "s1", "source": "nginx", "created": "2020-10-14 07:40:01" },
                        { "id": 2, "backupId": "s2", "source": "mariadb", "created": "2020-10-14 07:40:09" }
                    ]
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let records = client
        .query_environment_backups(&env("project-main"))
        .await
        .unwrap();

    let ids: Vec<_> = records.iter().map(|r| r.backup_id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2"]);
    assert_eq!(records[1].source.as_deref(), Some("mariadb"));
}

#[tokio::test]
async fn unknown_environment_has_no_backups() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "environmentByOpenshiftProjectName": null }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let records = client
        .query_environment_backups(&env("project-new"))
        .await
        .unwrap();

    assert!(records.is_empty());
}

#[tokio::test]
async fn graphql_errors_are_rejections() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "Unauthorized: You don't have permission" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .query_environment_backups(&env("project-main"))
        .await
        .unwrap_err();

    match err {
        RecordStoreError::Rejected { message } => assert!(message.contains("Unauthorized")),
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn server_errors_mean_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .query_environment_backups(&env("project-main"))
        .await
        .unwrap_err();

    assert!(matches!(err, RecordStoreError::Unavailable { .. }));
}

#[tokio::test]
async fn garbage_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .query_environment_backups(&env("project-main"))
        .await
        .unwrap_err();

    assert!(matches!(err, RecordStoreError::MalformedResponse { .. }));
}

#[tokio::test]
async fn delete_sends_the_backup_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header_exists("authorization"))
        .and(body_partial_json(json!({ "variables": { "backupId": "s2" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "deleteBackup": "success" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .delete_backup(&SnapshotId::new("s2").unwrap())
        .await
        .unwrap();
}

#[tokio::test]
async fn unreachable_api_is_unavailable() {
    // Nothing listens on the discard port.
    let client = LagoonClient::new(LagoonConfig {
        endpoint: "http://127.0.0.1:9/graphql".to_string(),
        audience: "api.dev".to_string(),
        token_signing_key: "super-secret-string".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let err = client
        .delete_backup(&SnapshotId::new("s2").unwrap())
        .await
        .unwrap_err();

    assert!(matches!(err, RecordStoreError::Unavailable { .. }));
}

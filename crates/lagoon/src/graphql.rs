//! GraphQL documents and response shapes used against the Lagoon API.

use serde::Deserialize;

pub(crate) const ENVIRONMENT_BACKUPS_QUERY: &str = r#"
query environmentBackups($openshiftProjectName: String!) {
  environmentByOpenshiftProjectName(openshiftProjectName: $openshiftProjectName) {
    id
    name
    openshiftProjectName
    backups {
      id
      backupId
      source
      created
    }
  }
}"#;

pub(crate) const DELETE_BACKUP_MUTATION: &str = r#"
mutation deleteBackup($backupId: String!) {
  deleteBackup(input: { backupId: $backupId })
}"#;

/// Standard GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Response<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EnvironmentBackupsData {
    pub environment_by_openshift_project_name: Option<EnvironmentBackups>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EnvironmentBackups {
    #[serde(default)]
    pub backups: Option<Vec<ApiBackup>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ApiBackup {
    pub backup_id: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DeleteBackupData {
    pub delete_backup: Option<serde_json::Value>,
}

//! Lagoon API adapter.
//!
//! Implements the [`handler::BackupRecordStore`] trait against the Lagoon
//! GraphQL API, which is the authoritative record of accepted backups.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, token minting, GraphQL documents and
//! response parsing all live here. The [`handler`] crate sees only
//! [`handler::BackupRecordStore`] and [`handler::RecordStoreError`].
//!
//! ## Timeouts
//!
//! Every request is bounded by [`LagoonConfig::timeout`]. Nothing is retried;
//! a failed call is reported to the dispatcher, which abandons the request.

mod graphql;
pub mod token;

use std::time::Duration;

use async_trait::async_trait;
use handler::{BackupRecord, BackupRecordStore, EnvironmentName, RecordStoreError, SnapshotId};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::graphql::{
    DeleteBackupData, EnvironmentBackupsData, Response, DELETE_BACKUP_MUTATION,
    ENVIRONMENT_BACKUPS_QUERY,
};
pub use crate::token::TokenIssuer;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the Lagoon API.
#[derive(Debug, Clone)]
pub struct LagoonConfig {
    /// Full GraphQL endpoint URL (e.g. `http://api:3000/graphql`).
    pub endpoint: String,
    /// JWT audience the API expects.
    pub audience: String,
    /// Shared secret used to sign API tokens.
    pub token_signing_key: String,
    /// Upper bound on one request, connect through body.
    pub timeout: Duration,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures inside the Lagoon adapter.
#[derive(Debug, Error)]
pub enum LagoonError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The request never produced a response.
    #[error("request to Lagoon API failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Lagoon API returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The API answered with GraphQL errors.
    #[error("Lagoon API returned errors: {0}")]
    GraphQl(String),

    /// The body was not a GraphQL response of the expected shape.
    #[error("could not decode Lagoon API response: {0}")]
    Decode(#[source] serde_json::Error),

    /// The response had neither data nor errors.
    #[error("Lagoon API response contained no data")]
    MissingData,

    /// An API token could not be signed.
    #[error("failed to sign API token: {0}")]
    Token(#[source] jsonwebtoken::errors::Error),
}

impl From<LagoonError> for RecordStoreError {
    fn from(err: LagoonError) -> Self {
        let message = err.to_string();
        match err {
            LagoonError::Client(_) | LagoonError::Transport(_) => {
                RecordStoreError::Unavailable { message }
            }
            LagoonError::Status { status, .. } if status.is_server_error() => {
                RecordStoreError::Unavailable { message }
            }
            LagoonError::Status { .. } | LagoonError::GraphQl(_) | LagoonError::Token(_) => {
                RecordStoreError::Rejected { message }
            }
            LagoonError::Decode(_) | LagoonError::MissingData => {
                RecordStoreError::MalformedResponse { message }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// GraphQL client for the Lagoon API.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct LagoonClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: TokenIssuer,
}

impl LagoonClient {
    /// Creates a client from `config`.
    pub fn new(config: LagoonConfig) -> Result<Self, LagoonError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(LagoonError::Client)?;

        Ok(Self {
            http,
            endpoint: config.endpoint,
            tokens: TokenIssuer::new(&config.token_signing_key, config.audience),
        })
    }

    /// Returns every backup recorded for the environment named `environment`.
    pub async fn environment_backups(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Vec<BackupRecord>, LagoonError> {
        let data: EnvironmentBackupsData = self
            .execute(
                ENVIRONMENT_BACKUPS_QUERY,
                json!({ "openshiftProjectName": environment.as_str() }),
            )
            .await?;

        let Some(env) = data.environment_by_openshift_project_name else {
            debug!("environment not known to the API, treating as having no backups");
            return Ok(Vec::new());
        };

        let records = env
            .backups
            .unwrap_or_default()
            .into_iter()
            .filter_map(|b| match SnapshotId::new(b.backup_id) {
                Some(backup_id) => Some(BackupRecord {
                    backup_id,
                    source: b.source,
                    created: b.created,
                }),
                None => {
                    warn!("skipping backup record with an empty backupId");
                    None
                }
            })
            .collect();
        Ok(records)
    }

    /// Deletes the backup record for `backup_id`.
    pub async fn delete(&self, backup_id: &SnapshotId) -> Result<(), LagoonError> {
        let data: DeleteBackupData = self
            .execute(
                DELETE_BACKUP_MUTATION,
                json!({ "backupId": backup_id.as_str() }),
            )
            .await?;
        debug!(result = ?data.delete_backup, "deleteBackup returned");
        Ok(())
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, LagoonError> {
        let token = self.tokens.issue()?;
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(LagoonError::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(LagoonError::Transport)?;
        if !status.is_success() {
            return Err(LagoonError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let parsed: Response<T> = serde_json::from_slice(&body).map_err(LagoonError::Decode)?;
        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(LagoonError::GraphQl(messages.join("; ")));
        }
        parsed.data.ok_or(LagoonError::MissingData)
    }
}

#[async_trait]
impl BackupRecordStore for LagoonClient {
    #[instrument(skip_all, fields(environment = %environment))]
    async fn query_environment_backups(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Vec<BackupRecord>, RecordStoreError> {
        Ok(self.environment_backups(environment).await?)
    }

    #[instrument(skip_all, fields(backup_id = %backup_id))]
    async fn delete_backup(&self, backup_id: &SnapshotId) -> Result<(), RecordStoreError> {
        Ok(self.delete(backup_id).await?)
    }
}

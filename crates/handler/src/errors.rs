//! Error taxonomy for the backup handler.
//!
//! [`DispatchError`] covers every way one webhook invocation can terminate
//! without committing. The port errors ([`RecordStoreError`], [`PublishError`])
//! are what adapters return at the trait boundary; adapter-internal errors are
//! defined in their own crates and converted on the way out.
//!
//! Nothing in this crate is retried. Every error is terminal for the request it
//! occurred in and is surfaced through logging; recovery relies on the operator
//! re-sending the webhook.

use thiserror::Error;

use crate::{EnvironmentName, SnapshotId};

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// The webhook body could not be decoded into a [`crate::BackupReport`].
#[derive(Debug, Error)]
#[error("malformed webhook payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// An identifier was given as an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0} must not be empty")]
pub struct EmptyIdentifier(pub &'static str);

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure talking to the authoritative backup-record API.
#[derive(Debug, Error)]
pub enum RecordStoreError {
    /// The API could not be reached or did not answer.
    #[error("backup record API unavailable: {message}")]
    Unavailable {
        /// Transport-level description.
        message: String,
    },

    /// The API answered but refused the operation (HTTP or GraphQL error).
    #[error("backup record API rejected the request: {message}")]
    Rejected {
        /// Error text returned by the API.
        message: String,
    },

    /// The API answered with something that could not be understood.
    #[error("unexpected response from backup record API: {message}")]
    MalformedResponse {
        /// What was wrong with the response.
        message: String,
    },
}

/// Failure handing an event to the message broker.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker connection or channel is not usable.
    #[error("broker unavailable: {message}")]
    Unavailable {
        /// Transport-level description.
        message: String,
    },

    /// The event could not be serialised.
    #[error("event could not be encoded: {message}")]
    Encoding {
        /// Serialiser message.
        message: String,
    },

    /// The broker negatively acknowledged the publish.
    #[error("broker rejected the event: {message}")]
    Rejected {
        /// Description of the rejection.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

/// Why a webhook invocation terminated without committing.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The report has no restore location, and either no snapshots or no
    /// environment to reconcile them against.
    #[error(
        "report for '{}' carries neither a restore location nor snapshots for a named environment",
        .environment.as_ref().map_or("<unnamed>", EnvironmentName::as_str)
    )]
    InvalidReport {
        /// Environment named in the report, if any.
        environment: Option<EnvironmentName>,
    },

    /// Known backups could not be fetched; nothing was retired or emitted.
    #[error("failed to query backups for '{environment}': {source}")]
    Query {
        /// Environment whose backups were requested.
        environment: EnvironmentName,
        /// Underlying API failure.
        source: RecordStoreError,
    },

    /// A stale backup could not be retired; remaining retirements and all
    /// emissions for the request were abandoned.
    #[error("failed to retire backup '{backup_id}': {source}")]
    Delete {
        /// The record that could not be deleted.
        backup_id: SnapshotId,
        /// Underlying API failure.
        source: RecordStoreError,
    },

    /// The restore event could not be handed to the broker.
    #[error("failed to publish restore event: {0}")]
    Publish(#[from] PublishError),
}

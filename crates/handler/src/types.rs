//! Shared value types for the backup handler domain.
//!
//! [`BackupReport`] and [`SnapshotEntry`] mirror the JSON the backup operator
//! (k8up) posts to the webhook endpoint. Only the fields the handler makes
//! decisions on are typed; everything else is carried through untouched so
//! downstream consumers see exactly what the operator reported.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::errors::DecodeError;
use crate::{EnvironmentName, EventId, SnapshotId};

// ---------------------------------------------------------------------------
// Inbound reports
// ---------------------------------------------------------------------------

/// One snapshot reported in a webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// The restic snapshot identifier.
    pub id: SnapshotId,

    /// Hostname the snapshot was taken under; used for environment attribution.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hostname: String,

    /// Remaining snapshot fields (`time`, `tree`, `paths`, `username`, ...).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Which branch of the dispatcher a report takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// A restore finished; the report is forwarded as-is.
    Restore,
    /// A backup run listed the snapshots currently in the repository.
    Snapshots,
    /// No restore location, and no snapshots or no environment to attribute
    /// them to; nothing to do.
    Invalid,
}

/// One webhook payload describing backup or restore activity for one environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupReport {
    /// Environment the report belongs to. Missing, null and empty names all
    /// decode as `None`; only the snapshot branch needs one.
    #[serde(
        default,
        deserialize_with = "optional_environment",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<EnvironmentName>,

    /// Storage bucket holding the restic repository.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bucket_name: String,

    /// Aggregate run metrics. Opaque to the handler.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub backup_metrics: Value,

    /// Snapshots currently present in the repository, in reported order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshots: Option<Vec<SnapshotEntry>>,

    /// Where a restore was written. Set only on restore reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_location: Option<String>,

    /// Snapshot a restore was taken from.
    #[serde(
        rename = "snapshot_ID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub snapshot_id: Option<String>,

    /// Files written by a restore.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_files: Option<Vec<String>>,

    /// Any other top-level keys, preserved for pass-through.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BackupReport {
    /// Decodes a report from a raw webhook body.
    pub fn from_json(body: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(body).map_err(DecodeError::from)
    }

    /// Returns the restore location, treating an empty string as unset.
    pub fn restore_location(&self) -> Option<&str> {
        self.restore_location.as_deref().filter(|l| !l.is_empty())
    }

    /// Returns the reported snapshots, or an empty slice when none were sent.
    pub fn snapshots(&self) -> &[SnapshotEntry] {
        self.snapshots.as_deref().unwrap_or_default()
    }

    /// Classifies the report. A restore location wins over a snapshot list,
    /// and a snapshot list without an environment name cannot be reconciled.
    pub fn classify(&self) -> ReportKind {
        if self.restore_location().is_some() {
            ReportKind::Restore
        } else if !self.snapshots().is_empty() && self.name.is_some() {
            ReportKind::Snapshots
        } else {
            ReportKind::Invalid
        }
    }

    /// Builds the payload of a `snapshot:finished` event: this report's
    /// environment, bucket and metrics with `snapshot` as the only entry.
    ///
    /// Restore-only fields and unknown keys are not carried over.
    pub fn reduced_to(&self, snapshot: SnapshotEntry) -> BackupReport {
        BackupReport {
            name: self.name.clone(),
            bucket_name: self.bucket_name.clone(),
            backup_metrics: self.backup_metrics.clone(),
            snapshots: Some(vec![snapshot]),
            restore_location: None,
            snapshot_id: None,
            restored_files: None,
            extra: Map::new(),
        }
    }
}

/// Reads an explicit `null` as the empty string.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn optional_environment<'de, D>(deserializer: D) -> Result<Option<EnvironmentName>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.and_then(EnvironmentName::new))
}

// ---------------------------------------------------------------------------
// Authoritative records
// ---------------------------------------------------------------------------

/// A backup previously accepted by the Lagoon API.
///
/// Owned by the API; the handler only reads these and asks for deletions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Same value as the [`SnapshotEntry::id`] the record was created from.
    pub backup_id: SnapshotId,

    /// Which workload the backup covers (e.g. `"nginx"`, `"mariadb"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Creation time as reported by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

impl BackupRecord {
    /// Creates a record carrying only its identifier.
    pub fn new(backup_id: SnapshotId) -> Self {
        Self {
            backup_id,
            source: None,
            created: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Value of the envelope's `webhookType` field for every event this handler emits.
pub const WEBHOOK_TYPE: &str = "resticbackup";

/// The `event` field of an outbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// A restore completed.
    #[serde(rename = "restore:finished")]
    RestoreFinished,
    /// A snapshot not yet known to the Lagoon API was observed.
    #[serde(rename = "snapshot:finished")]
    SnapshotFinished,
}

impl EventKind {
    /// Returns the wire name of this event kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RestoreFinished => "restore:finished",
            EventKind::SnapshotFinished => "snapshot:finished",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope handed to the message broker.
///
/// Created immediately before publishing and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    /// Always [`WEBHOOK_TYPE`].
    #[serde(rename = "webhookType")]
    pub webhook_type: String,

    /// What happened.
    pub event: EventKind,

    /// Fresh identifier for this envelope.
    #[serde(rename = "uuid")]
    pub id: EventId,

    /// The report (restore) or the report reduced to one snapshot.
    pub body: BackupReport,
}

impl OutboundEvent {
    /// Wraps a whole restore report.
    pub fn restore_finished(report: BackupReport) -> Self {
        Self::new(EventKind::RestoreFinished, report)
    }

    /// Wraps one new snapshot of `report`.
    pub fn snapshot_finished(report: &BackupReport, snapshot: SnapshotEntry) -> Self {
        Self::new(EventKind::SnapshotFinished, report.reduced_to(snapshot))
    }

    fn new(event: EventKind, body: BackupReport) -> Self {
        Self {
            webhook_type: WEBHOOK_TYPE.to_string(),
            event,
            id: EventId::new_random(),
            body,
        }
    }

    /// The single snapshot carried by a `snapshot:finished` event.
    pub fn snapshot(&self) -> Option<&SnapshotEntry> {
        self.body.snapshots().first()
    }
}

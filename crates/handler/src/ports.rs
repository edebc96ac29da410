//! Port traits implemented by infrastructure crates.
//!
//! The dispatcher only ever sees these traits. Implementations must be safe to
//! call concurrently from many in-flight requests; any serialisation the
//! underlying transport needs is the implementation's concern.

use async_trait::async_trait;

use crate::{
    BackupRecord, EnvironmentName, OutboundEvent, PublishError, RecordStoreError, SnapshotId,
};

/// The authoritative record of accepted backups.
///
/// Implemented by `lagoon::LagoonClient`.
#[async_trait]
pub trait BackupRecordStore: Send + Sync {
    /// Returns every backup currently recorded for `environment`.
    ///
    /// An environment the store has never heard of yields an empty list.
    async fn query_environment_backups(
        &self,
        environment: &EnvironmentName,
    ) -> Result<Vec<BackupRecord>, RecordStoreError>;

    /// Deletes the record for `backup_id`.
    async fn delete_backup(&self, backup_id: &SnapshotId) -> Result<(), RecordStoreError>;
}

/// Hands events to the durable message queue.
///
/// Implemented by `broker::AmqpPublisher`. A returned `Ok` means the broker
/// client accepted the event; delivery beyond that point is not guaranteed.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one event to the pre-declared destination.
    async fn publish(&self, event: &OutboundEvent) -> Result<(), PublishError>;
}

//! Per-webhook orchestration.
//!
//! [`Dispatcher::handle`] takes one decoded report through its branch:
//!
//! - **Restore**: the whole report is published as one `restore:finished`
//!   event. The backup record API is not consulted.
//! - **Snapshots**: known backups are fetched, [`diff`] decides what to retire
//!   and emit, stale records are deleted, then one `snapshot:finished` event is
//!   published per new snapshot.
//! - **Invalid**: logged and rejected; nothing is published.
//!
//! The dispatcher holds no state between invocations and may be cloned freely
//! into concurrent request handlers.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::reconcile::diff;
use crate::{
    BackupRecordStore, BackupReport, DispatchError, EnvironmentName, EventId, EventPublisher,
    OutboundEvent, ReportKind, SnapshotId,
};

/// One `snapshot:finished` event that was handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmittedEvent {
    /// The snapshot the event announces.
    pub snapshot_id: SnapshotId,
    /// Identifier of the published envelope.
    pub event_id: EventId,
}

/// What a committed invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "branch", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// A restore event was published.
    Restore {
        /// Identifier of the published envelope.
        event_id: EventId,
    },

    /// A snapshot report was reconciled.
    Snapshots {
        /// Backups deleted from the record API, in deletion order.
        retired: Vec<SnapshotId>,
        /// Events successfully handed to the broker.
        emitted: Vec<EmittedEvent>,
        /// New snapshots whose event could not be published. These are lost
        /// until the operator re-sends the report.
        failed: Vec<SnapshotId>,
    },
}

/// Handles one webhook at a time against injected collaborators.
#[derive(Clone)]
pub struct Dispatcher {
    records: Arc<dyn BackupRecordStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given record store and publisher.
    pub fn new(records: Arc<dyn BackupRecordStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { records, publisher }
    }

    /// Processes one report.
    ///
    /// Side effects are ordered: every retirement completes before the first
    /// emission. The first failed retirement aborts the rest of the request.
    /// Publish failures in the snapshot branch do not affect sibling events.
    #[instrument(
        skip_all,
        fields(environment = report.name.as_ref().map(EnvironmentName::as_str))
    )]
    pub async fn handle(&self, report: BackupReport) -> Result<DispatchOutcome, DispatchError> {
        match report.classify() {
            ReportKind::Restore => self.handle_restore(report).await,
            ReportKind::Snapshots => self.handle_snapshots(report).await,
            ReportKind::Invalid => {
                warn!("report has no restore location and no attributable snapshots, ignoring");
                Err(DispatchError::InvalidReport {
                    environment: report.name,
                })
            }
        }
    }

    async fn handle_restore(&self, report: BackupReport) -> Result<DispatchOutcome, DispatchError> {
        let event = OutboundEvent::restore_finished(report);
        let event_id = event.id;

        if let Err(e) = self.publisher.publish(&event).await {
            error!(event_id = %event_id, error = %e, "failed to publish restore event");
            return Err(DispatchError::Publish(e));
        }

        info!(
            event_id = %event_id,
            restored_snapshot = event.body.snapshot_id.as_deref().unwrap_or_default(),
            "restore event published"
        );
        Ok(DispatchOutcome::Restore { event_id })
    }

    async fn handle_snapshots(
        &self,
        report: BackupReport,
    ) -> Result<DispatchOutcome, DispatchError> {
        // classify() only routes named reports here.
        let Some(environment) = report.name.clone() else {
            return Err(DispatchError::InvalidReport { environment: None });
        };

        let known = match self.records.query_environment_backups(&environment).await {
            Ok(known) => known,
            Err(e) => {
                error!(error = %e, "unable to get backups from the API");
                return Err(DispatchError::Query {
                    environment,
                    source: e,
                });
            }
        };

        let plan = diff(&report, &known);
        info!(
            reported = report.snapshots().len(),
            known = known.len(),
            to_retire = plan.to_retire.len(),
            to_emit = plan.to_emit.len(),
            "reconciled snapshot report"
        );

        let mut retired = Vec::with_capacity(plan.to_retire.len());
        for backup_id in plan.to_retire {
            if let Err(e) = self.records.delete_backup(&backup_id).await {
                error!(backup_id = %backup_id, error = %e, "unable to delete backup from the API");
                return Err(DispatchError::Delete {
                    backup_id,
                    source: e,
                });
            }
            info!(backup_id = %backup_id, "deleted backup");
            retired.push(backup_id);
        }

        let mut emitted = Vec::with_capacity(plan.to_emit.len());
        let mut failed = Vec::new();
        for snapshot in plan.to_emit {
            let snapshot_id = snapshot.id.clone();
            let event = OutboundEvent::snapshot_finished(&report, snapshot);
            match self.publisher.publish(&event).await {
                Ok(()) => emitted.push(EmittedEvent {
                    snapshot_id,
                    event_id: event.id,
                }),
                Err(e) => {
                    error!(
                        snapshot_id = %snapshot_id,
                        event_id = %event.id,
                        error = %e,
                        "failed to publish snapshot event"
                    );
                    failed.push(snapshot_id);
                }
            }
        }

        Ok(DispatchOutcome::Snapshots {
            retired,
            emitted,
            failed,
        })
    }
}

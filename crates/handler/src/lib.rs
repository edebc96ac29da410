//! Core domain for the backup handler.
//!
//! The backup operator re-announces the full snapshot list of an environment
//! after every run. This crate turns those announcements into net-new events:
//! it compares each report against the backups the Lagoon API already knows,
//! retires records for snapshots that have disappeared, and emits one event per
//! snapshot that has not been seen before. Restore reports are forwarded as-is.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed ([`BackupRecordStore`], [`EventPublisher`]);
//! the `lagoon` and `broker` crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`EnvironmentName`, `SnapshotId`, `EventId`) |
//! | [`types`] | Report, record and outbound event types |
//! | [`matcher`] | Hostname-to-environment attribution |
//! | [`reconcile`] | The retire/emit diff |
//! | [`dispatch`] | Per-webhook orchestration |
//! | [`ports`] | Traits implemented by infrastructure crates |
//! | [`errors`] | Error taxonomy |

pub mod dispatch;
pub mod errors;
pub mod identifiers;
pub mod matcher;
pub mod ports;
pub mod reconcile;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use dispatch::{DispatchOutcome, Dispatcher, EmittedEvent};
pub use errors::{DecodeError, DispatchError, EmptyIdentifier, PublishError, RecordStoreError};
pub use identifiers::{EnvironmentName, EventId, SnapshotId};
pub use matcher::matches;
pub use ports::{BackupRecordStore, EventPublisher};
pub use reconcile::{diff, Reconciliation};
pub use types::{
    BackupRecord, BackupReport, EventKind, OutboundEvent, ReportKind, SnapshotEntry, WEBHOOK_TYPE,
};

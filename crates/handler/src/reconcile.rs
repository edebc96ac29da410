//! Snapshot reconciliation.
//!
//! Compares the snapshots an operator reports for an environment against the
//! backups the Lagoon API already knows about, and decides what to retire and
//! what to announce. This is the only place the handler makes decisions; it
//! performs no I/O and never fails.

use std::collections::HashSet;

use tracing::debug;

use crate::matcher::matches;
use crate::{BackupRecord, BackupReport, EnvironmentName, SnapshotEntry, SnapshotId};

/// The outcome of comparing one report against the known backups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    /// Known backups no longer present in the report, in record order.
    pub to_retire: Vec<SnapshotId>,

    /// Reported snapshots belonging to the environment that are not yet
    /// known, in report order.
    pub to_emit: Vec<SnapshotEntry>,
}

impl Reconciliation {
    /// Returns `true` if there is nothing to retire and nothing to emit.
    pub fn is_noop(&self) -> bool {
        self.to_retire.is_empty() && self.to_emit.is_empty()
    }
}

/// Computes which known backups to retire and which reported snapshots to emit.
///
/// - Every known backup whose identifier does not appear among the report's
///   snapshot identifiers is retired, once, regardless of hostname.
/// - Reported snapshots whose hostname does not belong to the report's
///   environment are dropped: neither emitted nor retired.
/// - Remaining snapshots are emitted unless their identifier is already known.
///   A snapshot identifier listed twice is emitted once.
///
/// A report without an environment name attributes no snapshot, so it only
/// ever retires.
pub fn diff(report: &BackupReport, known: &[BackupRecord]) -> Reconciliation {
    let snapshots = report.snapshots();
    let reported: HashSet<&SnapshotId> = snapshots.iter().map(|s| &s.id).collect();
    let known_ids: HashSet<&SnapshotId> = known.iter().map(|r| &r.backup_id).collect();

    let mut retiring = HashSet::new();
    let to_retire = known
        .iter()
        .map(|r| &r.backup_id)
        .filter(|id| !reported.contains(id) && retiring.insert(*id))
        .cloned()
        .collect();

    let environment = report.name.as_ref().map(EnvironmentName::as_str);
    let mut emitting = HashSet::new();
    let to_emit = snapshots
        .iter()
        .filter(|s| {
            let belongs = environment.is_some_and(|env| matches(env, &s.hostname));
            if !belongs {
                debug!(
                    snapshot_id = %s.id,
                    hostname = %s.hostname,
                    "snapshot hostname does not belong to environment, dropping"
                );
            }
            belongs
        })
        .filter(|s| !known_ids.contains(&s.id) && emitting.insert(&s.id))
        .cloned()
        .collect();

    Reconciliation {
        to_retire,
        to_emit,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn id(value: &str) -> SnapshotId {
        SnapshotId::new(value).unwrap()
    }

    fn snap(value: &str, hostname: &str) -> SnapshotEntry {
        SnapshotEntry {
            id: id(value),
            hostname: hostname.to_string(),
            metadata: Map::new(),
        }
    }

    fn report(environment: &str, snapshots: Vec<SnapshotEntry>) -> BackupReport {
        BackupReport {
            name: EnvironmentName::new(environment),
            bucket_name: "bucket".to_string(),
            backup_metrics: serde_json::Value::Null,
            snapshots: Some(snapshots),
            restore_location: None,
            snapshot_id: None,
            restored_files: None,
            extra: Map::new(),
        }
    }

    fn records(ids: &[&str]) -> Vec<BackupRecord> {
        ids.iter().map(|v| BackupRecord::new(id(v))).collect()
    }

    fn emitted_ids(plan: &Reconciliation) -> Vec<&str> {
        plan.to_emit.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn new_snapshot_with_nothing_known_is_emitted() {
        let plan = diff(&report("env1", vec![snap("s1", "env1")]), &[]);

        assert_eq!(emitted_ids(&plan), vec!["s1"]);
        assert!(plan.to_retire.is_empty());
    }

    #[test]
    fn known_snapshot_is_not_re_emitted_and_missing_one_is_retired() {
        let plan = diff(&report("env1", vec![snap("s1", "env1")]), &records(&["s1", "s2"]));

        assert!(plan.to_emit.is_empty());
        assert_eq!(plan.to_retire, vec![id("s2")]);
    }

    #[test]
    fn snapshot_from_another_environment_is_dropped() {
        let plan = diff(&report("env1", vec![snap("s9", "unrelated-env")]), &[]);

        assert!(plan.is_noop());
    }

    #[test]
    fn dropped_snapshot_still_protects_its_record_from_retirement() {
        // The record is present in the report, so it is not retired even
        // though the hostname does not match the environment.
        let plan = diff(
            &report("env1", vec![snap("s9", "unrelated-env")]),
            &records(&["s9"]),
        );

        assert!(plan.is_noop());
    }

    #[test]
    fn second_pass_after_emission_is_empty() {
        let first_report = report(
            "env1",
            vec![snap("s1", "env1"), snap("s2", "env1-mariadb-prebackuppod")],
        );
        let known = records(&["s0"]);

        let first = diff(&first_report, &known);
        assert_eq!(emitted_ids(&first), vec!["s1", "s2"]);
        assert_eq!(first.to_retire, vec![id("s0")]);

        // Downstream consumers record what was emitted; retired records are gone.
        let after: Vec<BackupRecord> = first
            .to_emit
            .iter()
            .map(|s| BackupRecord::new(s.id.clone()))
            .collect();

        let second = diff(&first_report, &after);
        assert!(second.is_noop());
    }

    #[test]
    fn every_unreported_record_is_retired_exactly_once() {
        let plan = diff(
            &report("env1", vec![snap("s2", "env1")]),
            &records(&["s1", "s2", "s3", "s1", "s4"]),
        );

        assert_eq!(plan.to_retire, vec![id("s1"), id("s3"), id("s4")]);
    }

    #[test]
    fn known_identifiers_never_appear_in_emissions() {
        let plan = diff(
            &report(
                "env1",
                vec![
                    snap("s1", "env1"),
                    snap("s2", "env1"),
                    snap("s3", "env1-nginx-prebackuppod"),
                    snap("s4", "env1"),
                ],
            ),
            &records(&["s2", "s4"]),
        );

        assert_eq!(emitted_ids(&plan), vec!["s1", "s3"]);
        assert!(plan.to_retire.is_empty());
    }

    #[test]
    fn duplicate_reported_snapshot_is_emitted_once() {
        let plan = diff(
            &report("env1", vec![snap("s1", "env1"), snap("s1", "env1")]),
            &[],
        );

        assert_eq!(emitted_ids(&plan), vec!["s1"]);
    }

    #[test]
    fn empty_snapshot_list_retires_everything() {
        let plan = diff(&report("env1", vec![]), &records(&["s1", "s2"]));

        assert_eq!(plan.to_retire, vec![id("s1"), id("s2")]);
        assert!(plan.to_emit.is_empty());
    }

    #[test]
    fn emission_preserves_report_order() {
        let plan = diff(
            &report(
                "env1",
                vec![snap("c", "env1"), snap("a", "env1"), snap("b", "env1")],
            ),
            &[],
        );

        assert_eq!(emitted_ids(&plan), vec!["c", "a", "b"]);
    }
}

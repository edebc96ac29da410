//! Attribution of reported snapshots to environments.

/// Hostname suffix the operator uses for snapshots taken by pre-backup hook pods.
const PRE_BACKUP_POD_SUFFIX: &str = "-prebackuppod";

/// Returns `true` if a snapshot reported under `hostname` belongs to `environment`.
///
/// A hostname belongs to the environment when it is exactly the environment
/// name (the primary workload) or has the form
/// `<environment>-<anything>-prebackuppod` (a pre-backup hook such as a
/// database dump pod). Matching is anchored at both ends; there is no
/// substring or fuzzy matching.
pub fn matches(environment: &str, hostname: &str) -> bool {
    if hostname == environment {
        return true;
    }

    hostname
        .strip_prefix(environment)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(PRE_BACKUP_POD_SUFFIX))
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::matches;

    #[test]
    fn exact_environment_name_matches() {
        assert!(matches("env1", "env1"));
    }

    #[test]
    fn pre_backup_pod_matches() {
        assert!(matches("env1", "env1-db-prebackuppod"));
        assert!(matches("env1", "env1-mariadb-single-prebackuppod"));
    }

    #[test]
    fn longer_environment_name_does_not_match() {
        assert!(!matches("env1", "env12"));
        assert!(!matches("env1", "env12-db-prebackuppod"));
    }

    #[test]
    fn environment_must_anchor_the_hostname() {
        assert!(!matches("env1", "otherenv-env1-prebackuppod"));
        assert!(!matches("env1", "xenv1"));
    }

    #[test]
    fn pre_backup_pod_needs_both_separators() {
        assert!(!matches("env1", "env1-prebackuppod"));
        assert!(!matches("env1", "env1-db-prebackuppod-extra"));
        assert!(!matches("env1", "env1db-prebackuppod"));
    }

    #[test]
    fn unrelated_hostname_does_not_match() {
        assert!(!matches("env1", "unrelated-env"));
        assert!(!matches("env1", ""));
    }
}

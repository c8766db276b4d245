//! Retention window enforcement
//!
//! Artifacts dated on or before `today - keep_weeks * 7 days` are expired.
//! Deletion is best effort: a file that cannot be removed is logged and the
//! walk continues, so retention converges over successive runs.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use tracing::{info, warn};

use crate::error::{BackupError, BackupResult};
use crate::history::{BackupHistory, HistoryEntry};
use crate::models::Artifact;

/// Retention and chain-anchoring parameters for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Number of weeks of backups to keep
    pub keep_weeks: u32,
    /// Day of the week on which a new full backup chain starts
    pub anchor_weekday: Weekday,
    /// Logical date of the run, fixed once at startup
    pub today: NaiveDate,
}

impl RetentionPolicy {
    /// Create a policy from an ISO weekday number (Monday = 1, Sunday = 7)
    pub fn new(keep_weeks: u32, anchor_weekday: u8, today: NaiveDate) -> BackupResult<Self> {
        if keep_weeks < 1 {
            return Err(BackupError::Validation(format!(
                "keep must be at least 1 week, got {}",
                keep_weeks
            )));
        }
        let anchor_weekday = iso_weekday(anchor_weekday).ok_or_else(|| {
            BackupError::Validation(format!(
                "weekday must be between 1 and 7, got {}",
                anchor_weekday
            ))
        })?;

        Ok(Self {
            keep_weeks,
            anchor_weekday,
            today,
        })
    }

    /// Last day whose artifacts are expired
    pub fn expiry(&self) -> NaiveDate {
        self.today - Duration::days(i64::from(self.keep_weeks) * 7)
    }

    /// Start of the current weekly chain
    pub fn cutoff(&self) -> NaiveDate {
        crate::planner::cutoff_date(self.today, self.anchor_weekday)
    }
}

/// Convert an ISO weekday number to a [`Weekday`]
pub fn iso_weekday(number: u8) -> Option<Weekday> {
    match number {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

/// ISO weekday number of a date (Sunday = 7)
pub fn iso_weekday_number(date: NaiveDate) -> u32 {
    date.weekday().number_from_monday()
}

/// Outcome of a prune pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Files removed
    pub deleted: Vec<PathBuf>,
    /// Files that could not be removed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl PruneReport {
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.failed.is_empty()
    }
}

/// Expired entries, oldest first
///
/// Walks the history in order and stops at the first entry newer than the
/// expiry date; anything after it is kept even if an older date follows.
pub fn expired<'a, A: Artifact>(
    history: &'a BackupHistory<A>,
    policy: &RetentionPolicy,
) -> Vec<&'a HistoryEntry<A>> {
    let expiry = policy.expiry();
    history
        .iter()
        .take_while(|entry| entry.artifact.date() <= expiry)
        .collect()
}

/// Delete expired artifacts from `dir`
///
/// Does nothing in dry-run mode.
pub fn prune<A: Artifact>(
    dir: &Path,
    history: &BackupHistory<A>,
    policy: &RetentionPolicy,
    dry_run: bool,
) -> PruneReport {
    let mut report = PruneReport::default();
    if dry_run {
        return report;
    }

    for entry in expired(history, policy) {
        let path = entry.path_in(dir);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(
                    op = "retention.delete",
                    file = %entry.file_name,
                    expiry = %policy.expiry(),
                    "Removed expired backup"
                );
                report.deleted.push(path);
            }
            Err(e) => {
                warn!(
                    op = "retention.delete.error",
                    file = %entry.file_name,
                    error = %e,
                    "Failed to remove expired backup"
                );
                report.failed.push((path, e.to_string()));
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history;
    use crate::models::DataArtifact;
    use crate::naming::{DataNaming, NamingScheme};
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 12).unwrap()
    }

    fn write_full(dir: &Path, date: NaiveDate, checkpoint: &str) -> PathBuf {
        let name = DataNaming::encode(&DataArtifact::full(date, checkpoint).unwrap());
        let path = dir.join(name);
        fs::write(&path, b"snapshot").unwrap();
        path
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetentionPolicy::new(0, 7, today()).is_err());
        assert!(RetentionPolicy::new(1, 0, today()).is_err());
        assert!(RetentionPolicy::new(1, 8, today()).is_err());

        let policy = RetentionPolicy::new(2, 7, today()).unwrap();
        assert_eq!(policy.anchor_weekday, Weekday::Sun);
        assert_eq!(policy.expiry(), today() - Duration::days(14));
    }

    #[test]
    fn test_prune_deletes_only_expired() {
        let temp = TempDir::new().unwrap();
        let old = write_full(temp.path(), today() - Duration::days(20), "100");
        let middle = write_full(temp.path(), today() - Duration::days(10), "200");
        let recent = write_full(temp.path(), today() - Duration::days(1), "300");

        let policy = RetentionPolicy::new(1, 3, today()).unwrap();
        let history = history::load::<DataNaming>(temp.path()).unwrap();
        let report = prune(temp.path(), &history, &policy, false);

        assert_eq!(report.deleted, vec![old.clone()]);
        assert!(report.failed.is_empty());
        assert!(!old.exists());
        assert!(middle.exists());
        assert!(recent.exists());
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let temp = TempDir::new().unwrap();
        let boundary = write_full(temp.path(), today() - Duration::days(7), "100");
        let kept = write_full(temp.path(), today() - Duration::days(6), "200");

        let policy = RetentionPolicy::new(1, 3, today()).unwrap();
        let history = history::load::<DataNaming>(temp.path()).unwrap();
        prune(temp.path(), &history, &policy, false);

        assert!(!boundary.exists());
        assert!(kept.exists());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let temp = TempDir::new().unwrap();
        write_full(temp.path(), today() - Duration::days(30), "100");
        write_full(temp.path(), today() - Duration::days(2), "200");

        let policy = RetentionPolicy::new(1, 3, today()).unwrap();

        let history = history::load::<DataNaming>(temp.path()).unwrap();
        let first = prune(temp.path(), &history, &policy, false);
        assert_eq!(first.deleted.len(), 1);

        let history = history::load::<DataNaming>(temp.path()).unwrap();
        let second = prune(temp.path(), &history, &policy, false);
        assert!(second.is_empty());
    }

    #[test]
    fn test_dry_run_deletes_nothing() {
        let temp = TempDir::new().unwrap();
        let old = write_full(temp.path(), today() - Duration::days(30), "100");

        let policy = RetentionPolicy::new(1, 3, today()).unwrap();
        let history = history::load::<DataNaming>(temp.path()).unwrap();
        let report = prune(temp.path(), &history, &policy, true);

        assert!(report.is_empty());
        assert!(old.exists());
        assert_eq!(expired(&history, &policy).len(), 1);
    }

    #[test]
    fn test_missing_file_is_reported_not_fatal() {
        let temp = TempDir::new().unwrap();
        let gone = write_full(temp.path(), today() - Duration::days(30), "100");
        let also_old = write_full(temp.path(), today() - Duration::days(29), "150");

        let policy = RetentionPolicy::new(1, 3, today()).unwrap();
        let history = history::load::<DataNaming>(temp.path()).unwrap();
        fs::remove_file(&gone).unwrap();

        let report = prune(temp.path(), &history, &policy, false);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.deleted, vec![also_old.clone()]);
        assert!(!also_old.exists());
    }
}

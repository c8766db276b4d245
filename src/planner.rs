//! Weekly backup chain planning
//!
//! A chain starts with a full backup on the anchor weekday. Every later run
//! until the next anchor takes an incremental against the checkpoint of that
//! full backup, so restoring never needs more than one full plus one
//! incremental.

use chrono::{Duration, NaiveDate, Weekday};

use crate::history::{BackupHistory, HistoryEntry};
use crate::models::{BackupKind, DataArtifact};
use crate::retention::RetentionPolicy;

/// Base checkpoint of a full backup
pub const FULL_BASE_CHECKPOINT: &str = "0";

/// What the next data backup should be
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPlan {
    pub kind: BackupKind,
    pub base_checkpoint: String,
}

impl BackupPlan {
    pub fn full() -> Self {
        Self {
            kind: BackupKind::Full,
            base_checkpoint: FULL_BASE_CHECKPOINT.to_string(),
        }
    }

    pub fn incremental(base_checkpoint: impl Into<String>) -> Self {
        Self {
            kind: BackupKind::Incremental,
            base_checkpoint: base_checkpoint.into(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.kind == BackupKind::Full
    }
}

/// Most recent `anchor` on or before `today`
pub fn cutoff_date(today: NaiveDate, anchor: Weekday) -> NaiveDate {
    let current = crate::retention::iso_weekday_number(today);
    let anchor = anchor.number_from_monday();
    let days_back = (current + 7 - anchor) % 7;
    today - Duration::days(i64::from(days_back))
}

/// Most recent full backup in the history
pub fn last_full(history: &BackupHistory<DataArtifact>) -> Option<&HistoryEntry<DataArtifact>> {
    history.iter().rev().find(|entry| entry.artifact.is_full())
}

/// Decide the type and base checkpoint of the next data backup
pub fn plan_next(history: &BackupHistory<DataArtifact>, policy: &RetentionPolicy) -> BackupPlan {
    let cutoff = policy.cutoff();
    match last_full(history) {
        Some(entry) if entry.artifact.date >= cutoff => {
            BackupPlan::incremental(entry.artifact.checkpoint.clone())
        }
        _ => BackupPlan::full(),
    }
}

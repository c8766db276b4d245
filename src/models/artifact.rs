//! Backup artifact representation
//!
//! An artifact is one stored backup unit: a compressed xbstream data snapshot
//! or a compressed copy of one binlog segment.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::error::{BackupError, BackupResult};

/// Kind of a stored backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackupKind {
    /// Complete, self-sufficient data snapshot
    Full,
    /// Data snapshot holding only changes since a base checkpoint
    Incremental,
    /// Compressed binlog segment
    Logs,
}

impl BackupKind {
    /// Tag used in file names
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Incremental => "INCR",
            Self::Logs => "LOGS",
        }
    }

    /// Whether this kind is a data snapshot
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Full | Self::Incremental)
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.tag())
    }
}

impl FromStr for BackupKind {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FULL" => Ok(Self::Full),
            "INCR" => Ok(Self::Incremental),
            "LOGS" => Ok(Self::Logs),
            other => Err(BackupError::Validation(format!(
                "unknown backup kind tag '{}'",
                other
            ))),
        }
    }
}

/// Common view over both artifact types
pub trait Artifact {
    /// Day the artifact was produced
    fn date(&self) -> NaiveDate;

    /// Kind of the artifact
    fn kind(&self) -> BackupKind;
}

/// A compressed data snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataArtifact {
    pub date: NaiveDate,
    pub kind: BackupKind,
    /// Checkpoint the snapshot is based on ("0" for a full backup)
    pub base_checkpoint: String,
    /// Checkpoint reported by the backup tool on completion
    pub checkpoint: String,
}

impl DataArtifact {
    /// Create a data artifact, rejecting fields the naming grammar cannot carry
    pub fn new(
        date: NaiveDate,
        kind: BackupKind,
        base_checkpoint: impl Into<String>,
        checkpoint: impl Into<String>,
    ) -> BackupResult<Self> {
        if !kind.is_data() {
            return Err(BackupError::Validation(format!(
                "{} is not a data backup kind",
                kind
            )));
        }
        let base_checkpoint = base_checkpoint.into();
        let checkpoint = checkpoint.into();
        validate_field("base checkpoint", &base_checkpoint)?;
        validate_field("checkpoint", &checkpoint)?;

        Ok(Self {
            date,
            kind,
            base_checkpoint,
            checkpoint,
        })
    }

    /// Create a full backup artifact
    pub fn full(date: NaiveDate, checkpoint: impl Into<String>) -> BackupResult<Self> {
        Self::new(date, BackupKind::Full, "0", checkpoint)
    }

    /// Create an incremental backup artifact
    pub fn incremental(
        date: NaiveDate,
        base_checkpoint: impl Into<String>,
        checkpoint: impl Into<String>,
    ) -> BackupResult<Self> {
        Self::new(date, BackupKind::Incremental, base_checkpoint, checkpoint)
    }

    pub fn is_full(&self) -> bool {
        self.kind == BackupKind::Full
    }
}

impl Artifact for DataArtifact {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn kind(&self) -> BackupKind {
        self.kind
    }
}

/// A compressed copy of one binlog segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogArtifact {
    pub date: NaiveDate,
    /// Name of the binlog segment it was compressed from
    pub source_log_name: String,
}

impl LogArtifact {
    pub fn new(date: NaiveDate, source_log_name: impl Into<String>) -> BackupResult<Self> {
        let source_log_name = source_log_name.into();
        validate_field("source log name", &source_log_name)?;
        Ok(Self {
            date,
            source_log_name,
        })
    }
}

impl Artifact for LogArtifact {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn kind(&self) -> BackupKind {
        BackupKind::Logs
    }
}

/// Fields are joined with '_' and live in a single directory entry
fn validate_field(label: &str, value: &str) -> BackupResult<()> {
    if value.is_empty() {
        return Err(BackupError::Validation(format!("{} cannot be empty", label)));
    }
    if value.contains('_') || value.contains('/') || value.contains('\\') {
        return Err(BackupError::Validation(format!(
            "{} '{}' cannot contain '_' or path separators",
            label, value
        )));
    }
    Ok(())
}

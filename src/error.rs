//! Custom error types for mysql-backup
//!
//! This module defines the error hierarchy for the application using thiserror
//! for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// The main error type for backup operations
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Validation errors for options and artifact fields
    #[error("Validation error: {0}")]
    Validation(String),

    /// A backup directory could not be listed
    #[error("Failed to read directory {}: {reason}", path.display())]
    DirectoryRead { path: PathBuf, reason: String },

    /// A file name does not follow the naming grammar
    #[error("Invalid backup name '{file_name}': {reason}")]
    InvalidName { file_name: String, reason: String },

    /// A subprocess could not be started or waited on
    #[error("Process error running `{command}`: {reason}")]
    Process { command: String, reason: String },

    /// The backup tool exited without reporting a checkpoint
    #[error("Backup tool never reported a checkpoint, discarded {}", temp_file.display())]
    CheckpointMissing { temp_file: PathBuf },

    /// The finished backup could not be moved to its final name
    #[error("Failed to publish {} as {}: {reason}", from.display(), to.display())]
    Publish {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
}

impl BackupError {
    /// Create an invalid-name error
    pub fn invalid_name(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidName {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Result type alias for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

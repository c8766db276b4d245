//! Backup directory layout
//!
//! ```text
//! <bak-dir>/
//!   data/   compressed xbstream snapshots
//!   logs/   compressed binlog segments
//! ```

use std::path::{Path, PathBuf};

use crate::error::{BackupError, BackupResult};

/// Permission bits for directories created by a run
pub const DIR_MODE: u32 = 0o755;

/// Manages the paths under the backup root
#[derive(Debug, Clone)]
pub struct BackupPaths {
    root: PathBuf,
}

impl BackupPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the data snapshot directory
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Get the binlog archive directory
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_dir(path: &Path) -> BackupResult<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }

    builder.create(path).map_err(|e| {
        BackupError::Io(format!(
            "Failed to create directory {}: {}",
            path.display(),
            e
        ))
    })
}

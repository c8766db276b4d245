//! Backup options
//!
//! Options can come from a JSON file and are then overridden by command line
//! flags or environment variables. They are validated once by the caller
//! before any backup work starts.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BackupError, BackupResult};

/// Which backups a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    /// Data snapshots only (default)
    #[default]
    Data,
    /// Binlog archiving only
    Logs,
    /// Data snapshots, then binlogs
    Both,
}

impl BackupMode {
    pub fn includes_data(&self) -> bool {
        matches!(self, Self::Data | Self::Both)
    }

    pub fn includes_logs(&self) -> bool {
        matches!(self, Self::Logs | Self::Both)
    }
}

impl FromStr for BackupMode {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "data" => Ok(Self::Data),
            "logs" => Ok(Self::Logs),
            "both" => Ok(Self::Both),
            other => Err(BackupError::Validation(format!(
                "unknown mode '{}' (expected data, logs or both)",
                other
            ))),
        }
    }
}

/// Everything a run needs to know
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupOptions {
    #[serde(default)]
    pub mode: BackupMode,

    /// Root directory holding `data/` and `logs/`
    #[serde(default)]
    pub bak_dir: PathBuf,

    /// Weeks of backups to keep
    #[serde(default = "default_keep_weeks")]
    pub keep_weeks: u32,

    /// ISO weekday of the weekly full backup (Monday = 1, Sunday = 7)
    #[serde(default = "default_weekday")]
    pub weekday: u8,

    /// MySQL configuration passed to the backup tool
    #[serde(default = "default_my_cnf")]
    pub my_cnf: PathBuf,

    /// Backup tool, e.g. `xtrabackup`, `mariabackup` or an absolute path
    #[serde(default = "default_executor")]
    pub executor: String,

    /// Binlog basename, as in `show variables like 'log_bin_basename'`
    #[serde(default)]
    pub log_bin: Option<PathBuf>,

    /// Print commands instead of running them
    #[serde(default)]
    pub dry_run: bool,

    /// Copy threads used by the backup tool
    #[serde(default = "default_threads")]
    pub parallel: u32,

    /// Compression program
    #[serde(default = "default_compressor")]
    pub compressor: String,

    /// Compression threads
    #[serde(default = "default_threads")]
    pub compress_threads: u32,
}

fn default_keep_weeks() -> u32 {
    2
}

fn default_weekday() -> u8 {
    6 // Saturday
}

fn default_my_cnf() -> PathBuf {
    PathBuf::from("/etc/my.cnf")
}

fn default_executor() -> String {
    "xtrabackup".to_string()
}

fn default_threads() -> u32 {
    4
}

fn default_compressor() -> String {
    "zstd".to_string()
}

impl Default for BackupOptions {
    fn default() -> Self {
        Self {
            mode: BackupMode::default(),
            bak_dir: PathBuf::new(),
            keep_weeks: default_keep_weeks(),
            weekday: default_weekday(),
            my_cnf: default_my_cnf(),
            executor: default_executor(),
            log_bin: None,
            dry_run: false,
            parallel: default_threads(),
            compressor: default_compressor(),
            compress_threads: default_threads(),
        }
    }
}

impl BackupOptions {
    /// Load options from a JSON file
    pub fn load(path: &Path) -> BackupResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            BackupError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            BackupError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Check the options before a run
    pub fn validate(&self) -> BackupResult<()> {
        if self.keep_weeks < 1 {
            return Err(BackupError::Validation(format!(
                "--keep={} (must be >= 1)",
                self.keep_weeks
            )));
        }

        if self.bak_dir.as_os_str().is_empty() || !self.bak_dir.is_dir() {
            return Err(BackupError::Validation(format!(
                "--bak-dir={} (directory must exist)",
                self.bak_dir.display()
            )));
        }

        if self.parallel == 0 || self.compress_threads == 0 {
            return Err(BackupError::Validation(
                "thread counts must be at least 1".into(),
            ));
        }

        if !(1..=7).contains(&self.weekday) {
            return Err(BackupError::Validation(format!(
                "--weekday={} (must be 1-7)",
                self.weekday
            )));
        }

        if self.mode.includes_data() {
            if !self.my_cnf.exists() {
                return Err(BackupError::Validation(format!(
                    "--my-cnf={} (file not found)",
                    self.my_cnf.display()
                )));
            }
            if self.executor.trim().is_empty() {
                return Err(BackupError::Validation("--executor cannot be empty".into()));
            }
        }

        if self.mode.includes_logs() {
            let log_bin = self.log_bin.as_deref().ok_or_else(|| {
                BackupError::Validation("--log-bin is required for log backups".into())
            })?;
            log_bin_basename(log_bin)?;
        }

        Ok(())
    }
}

/// Basename of the binlog files, as it appears in log artifact names
///
/// The basename becomes part of a `_`-separated file name, so it cannot
/// contain `_` itself.
pub fn log_bin_basename(log_bin: &Path) -> BackupResult<&str> {
    let basename = log_bin
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            BackupError::Validation(format!("--log-bin={} has no basename", log_bin.display()))
        })?;
    if basename.contains('_') {
        return Err(BackupError::Validation(format!(
            "--log-bin basename {} cannot contain '_'",
            basename
        )));
    }
    Ok(basename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_options(temp: &TempDir) -> BackupOptions {
        let my_cnf = temp.path().join("my.cnf");
        std::fs::write(&my_cnf, "[mysqld]\n").unwrap();
        BackupOptions {
            mode: BackupMode::Both,
            bak_dir: temp.path().to_path_buf(),
            my_cnf,
            log_bin: Some(PathBuf::from("/var/lib/mysql/mysql-bin")),
            ..BackupOptions::default()
        }
    }

    #[test]
    fn test_defaults() {
        let options = BackupOptions::default();
        assert_eq!(options.mode, BackupMode::Data);
        assert_eq!(options.keep_weeks, 2);
        assert_eq!(options.weekday, 6);
        assert_eq!(options.executor, "xtrabackup");
        assert_eq!(options.compressor, "zstd");
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("both".parse::<BackupMode>().unwrap(), BackupMode::Both);
        assert_eq!("LOGS".parse::<BackupMode>().unwrap(), BackupMode::Logs);
        assert!("all".parse::<BackupMode>().is_err());
    }

    #[test]
    fn test_valid_options_pass() {
        let temp = TempDir::new().unwrap();
        valid_options(&temp).validate().unwrap();
    }

    #[test]
    fn test_rejects_zero_keep() {
        let temp = TempDir::new().unwrap();
        let mut options = valid_options(&temp);
        options.keep_weeks = 0;
        assert!(matches!(options.validate(), Err(BackupError::Validation(_))));
    }

    #[test]
    fn test_rejects_bad_weekday() {
        let temp = TempDir::new().unwrap();
        let mut options = valid_options(&temp);
        options.weekday = 8;
        assert!(options.validate().is_err());

        options.mode = BackupMode::Logs;
        assert!(options.validate().is_err());

        options.weekday = 7;
        options.validate().unwrap();
    }

    #[test]
    fn test_my_cnf_only_checked_for_data() {
        let temp = TempDir::new().unwrap();
        let mut options = valid_options(&temp);
        options.my_cnf = temp.path().join("missing.cnf");
        assert!(options.validate().is_err());

        options.mode = BackupMode::Logs;
        options.validate().unwrap();
    }

    #[test]
    fn test_requires_log_bin_for_logs() {
        let temp = TempDir::new().unwrap();
        let mut options = valid_options(&temp);
        options.log_bin = None;
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("--log-bin"));

        options.mode = BackupMode::Data;
        options.validate().unwrap();
    }

    #[test]
    fn test_rejects_underscore_in_log_basename() {
        let temp = TempDir::new().unwrap();
        let mut options = valid_options(&temp);
        options.log_bin = Some(PathBuf::from("/var/lib/mysql/mysql_bin"));
        let err = options.validate().unwrap_err();
        assert!(matches!(err, BackupError::Validation(_)));
        assert!(err.to_string().contains("mysql_bin"));

        options.mode = BackupMode::Data;
        options.validate().unwrap();
    }

    #[test]
    fn test_log_bin_basename() {
        assert_eq!(
            log_bin_basename(Path::new("/var/lib/mysql/mysql-bin")).unwrap(),
            "mysql-bin"
        );
        assert!(log_bin_basename(Path::new("/")).is_err());
    }

    #[test]
    fn test_rejects_missing_bak_dir() {
        let temp = TempDir::new().unwrap();
        let mut options = valid_options(&temp);
        options.bak_dir = temp.path().join("missing");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_load_partial_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("backup.json");
        std::fs::write(
            &path,
            r#"{"mode": "both", "bak_dir": "/backup", "keep_weeks": 4, "log_bin": "/var/lib/mysql/binlog"}"#,
        )
        .unwrap();

        let options = BackupOptions::load(&path).unwrap();
        assert_eq!(options.mode, BackupMode::Both);
        assert_eq!(options.keep_weeks, 4);
        assert_eq!(options.weekday, 6);
        assert_eq!(options.log_bin, Some(PathBuf::from("/var/lib/mysql/binlog")));
    }

    #[test]
    fn test_load_invalid_json() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("backup.json");
        std::fs::write(&path, "not json").unwrap();

        let err = BackupOptions::load(&path).unwrap_err();
        assert!(matches!(err, BackupError::Config(_)));
    }
}

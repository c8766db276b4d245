//! Global command line options
//!
//! Every option can also be set through a `MYSQL_BACKUP_*` environment
//! variable. Values given here override those read from `--config`.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Args;

use crate::config::{BackupMode, BackupOptions};
use crate::error::{BackupError, BackupResult};
use crate::naming::parse_compact_date;

/// Options shared by every subcommand
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// JSON file with backup options
    #[arg(long, global = true, env = "MYSQL_BACKUP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backups to produce: data, logs or both
    #[arg(long, global = true, env = "MYSQL_BACKUP_MODE")]
    pub mode: Option<BackupMode>,

    /// Backup root directory (must exist)
    #[arg(long, global = true, env = "MYSQL_BACKUP_DIR")]
    pub bak_dir: Option<PathBuf>,

    /// Weeks of backups to keep
    #[arg(long, global = true, env = "MYSQL_BACKUP_KEEP")]
    pub keep: Option<u32>,

    /// ISO weekday of the weekly full backup (1 = Monday, 7 = Sunday)
    #[arg(long, global = true, env = "MYSQL_BACKUP_WEEKDAY")]
    pub weekday: Option<u8>,

    /// MySQL configuration file passed to the backup tool
    #[arg(long, global = true, env = "MYSQL_BACKUP_MY_CNF")]
    pub my_cnf: Option<PathBuf>,

    /// Backup tool: xtrabackup, mariabackup or a path
    #[arg(long, global = true, env = "MYSQL_BACKUP_EXECUTOR")]
    pub executor: Option<String>,

    /// Binlog basename, e.g. /var/lib/mysql/mysql-bin
    #[arg(long, global = true, env = "MYSQL_BACKUP_LOG_BIN")]
    pub log_bin: Option<PathBuf>,

    /// Print the commands without running them
    #[arg(long, global = true, env = "MYSQL_BACKUP_DRY_RUN")]
    pub dry_run: bool,

    /// Copy threads used by the backup tool
    #[arg(long, global = true, env = "MYSQL_BACKUP_PARALLEL")]
    pub parallel: Option<u32>,

    /// Compression program
    #[arg(long, global = true, env = "MYSQL_BACKUP_COMPRESSOR")]
    pub compressor: Option<String>,

    /// Compression threads
    #[arg(long, global = true, env = "MYSQL_BACKUP_COMPRESS_THREADS")]
    pub compress_threads: Option<u32>,

    /// Logical date of the run (YYYYMMDD)
    #[arg(long, global = true, hide = true)]
    pub today: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Options from the config file (or defaults) with command line overrides
    pub fn resolve(&self) -> BackupResult<BackupOptions> {
        let mut options = match &self.config {
            Some(path) => BackupOptions::load(path)?,
            None => BackupOptions::default(),
        };
        self.apply_to(&mut options);
        Ok(options)
    }

    /// Overwrite every option that was given explicitly
    pub fn apply_to(&self, options: &mut BackupOptions) {
        if let Some(mode) = self.mode {
            options.mode = mode;
        }
        if let Some(dir) = &self.bak_dir {
            options.bak_dir = dir.clone();
        }
        if let Some(keep) = self.keep {
            options.keep_weeks = keep;
        }
        if let Some(weekday) = self.weekday {
            options.weekday = weekday;
        }
        if let Some(my_cnf) = &self.my_cnf {
            options.my_cnf = my_cnf.clone();
        }
        if let Some(executor) = &self.executor {
            options.executor = executor.clone();
        }
        if let Some(log_bin) = &self.log_bin {
            options.log_bin = Some(log_bin.clone());
        }
        if self.dry_run {
            options.dry_run = true;
        }
        if let Some(parallel) = self.parallel {
            options.parallel = parallel;
        }
        if let Some(compressor) = &self.compressor {
            options.compressor = compressor.clone();
        }
        if let Some(threads) = self.compress_threads {
            options.compress_threads = threads;
        }
    }

    /// Logical date of the run, `fallback` unless `--today` was given
    pub fn today_or(&self, fallback: NaiveDate) -> BackupResult<NaiveDate> {
        match &self.today {
            Some(value) => parse_compact_date(value).ok_or_else(|| {
                BackupError::Validation(format!("--today={} (expected YYYYMMDD)", value))
            }),
            None => Ok(fallback),
        }
    }
}

//! mysql-backup - Rotating MySQL/MariaDB backups
//!
//! This library provides the backup lifecycle behind the `mysql_backup`
//! binary: weekly full + daily incremental data snapshots taken with
//! xtrabackup or mariabackup, and per-segment compressed binlog copies.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Backup options and directory layout
//! - `error`: Custom error types
//! - `models`: Backup artifacts and kinds
//! - `naming`: File name encoding of artifact metadata
//! - `history`: Backup history read back from a directory listing
//! - `retention`: Expiry of old artifacts
//! - `planner`: Full or incremental decision
//! - `process`: External program execution
//! - `backup`: Orchestration of data and binlog backups
//! - `cli`: Command handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use mysql_backup::backup::{run_backups, RunContext};
//! use mysql_backup::config::BackupOptions;
//! use mysql_backup::process::SystemRunner;
//!
//! let options = BackupOptions::load(&path)?;
//! options.validate()?;
//! let ctx = RunContext::from_options(&options, today)?;
//! run_backups(&options, &ctx, &SystemRunner::new())?;
//! ```

pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod naming;
pub mod planner;
pub mod process;
pub mod retention;

pub use error::BackupError;

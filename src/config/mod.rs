//! Configuration module for mysql-backup
//!
//! This module provides:
//! - Backup options with JSON file loading and validation
//! - Backup directory layout

pub mod options;
pub mod paths;

pub use options::{BackupMode, BackupOptions};
pub use paths::BackupPaths;

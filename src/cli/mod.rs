//! CLI command handlers
//!
//! This module bridges clap argument parsing with the backup core.

pub mod args;
pub mod backup;

pub use args::GlobalArgs;
pub use backup::{handle_backup_command, BackupCommands};

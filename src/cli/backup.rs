//! Backup CLI commands
//!
//! Implements the `run`, `list` and `plan` subcommands.

use std::path::Path;

use chrono::NaiveDate;
use clap::Subcommand;

use crate::backup::{
    run_backups, BackupStrategy, DataReport, LogsBackup, LogsReport, RunContext, RunOutcome,
};
use crate::config::{BackupOptions, BackupPaths};
use crate::error::{BackupError, BackupResult};
use crate::history::{self, BackupHistory};
use crate::models::{Artifact, DataArtifact};
use crate::naming::{format_date, DataNaming, LogNaming, NamingScheme};
use crate::planner;
use crate::process::SystemRunner;
use crate::retention;

/// Backup subcommands
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupCommands {
    /// Prune expired backups, then back up per --mode (default)
    Run,

    /// List stored backups
    List,

    /// Show what the next run would do without touching anything
    Plan,
}

/// Handle a backup command
pub fn handle_backup_command(
    options: &BackupOptions,
    today: NaiveDate,
    cmd: BackupCommands,
) -> BackupResult<()> {
    match cmd {
        BackupCommands::Run => {
            options.validate()?;
            let ctx = RunContext::from_options(options, today)?;
            let summary = run_backups(options, &ctx, &SystemRunner::new())?;

            if let Some(outcome) = &summary.data {
                print_data_outcome(outcome);
            }
            if let Some(outcome) = &summary.logs {
                print_logs_outcome(outcome);
            }
        }

        BackupCommands::List => {
            let paths = require_bak_dir(options)?;

            let data = load_if_present::<DataNaming>(&paths.data_dir())?;
            println!("Data Backups");
            println!("============");
            if data.is_empty() {
                println!("No data backups found.");
            }
            for entry in &data {
                let a = &entry.artifact;
                println!(
                    "  {}  {:<4}  base {:<12} checkpoint {:<12} {}",
                    a.date,
                    a.kind,
                    a.base_checkpoint,
                    a.checkpoint,
                    file_size(&entry.path_in(&paths.data_dir())),
                );
            }
            println!();

            let logs = load_if_present::<LogNaming>(&paths.logs_dir())?;
            println!("Log Backups");
            println!("===========");
            if logs.is_empty() {
                println!("No log backups found.");
            }
            for entry in &logs {
                println!(
                    "  {}  {:<4}  {:<24} {}",
                    entry.artifact.date(),
                    entry.artifact.kind(),
                    entry.artifact.source_log_name,
                    file_size(&entry.path_in(&paths.logs_dir())),
                );
            }
            println!();
            println!("Total: {} data, {} log backup(s)", data.len(), logs.len());
        }

        BackupCommands::Plan => {
            let paths = require_bak_dir(options)?;
            let ctx = RunContext::from_options(options, today)?;
            let policy = &ctx.policy;

            println!("Backup Plan for {}", format_date(today));
            println!("=======================");
            println!(
                "Retention: {} week(s), expiring on or before {}",
                policy.keep_weeks,
                policy.expiry()
            );

            if options.mode.includes_data() {
                let history = load_if_present::<DataNaming>(&paths.data_dir())?;
                print_expired("data", &history, &ctx);
                let plan = planner::plan_next(&history, policy);
                println!();
                println!("Chain start: {} ({:?})", policy.cutoff(), policy.anchor_weekday);
                if plan.is_full() {
                    println!("Next data backup: FULL");
                } else {
                    println!(
                        "Next data backup: INCR from checkpoint {}",
                        plan.base_checkpoint
                    );
                }
            }

            if options.mode.includes_logs() {
                let strategy = LogsBackup::from_options(paths.logs_dir(), options)?;
                let history = load_if_present::<LogNaming>(&paths.logs_dir())?;
                print_expired("log", &history, &ctx);
                let plan = strategy.plan_next(&history, &ctx)?;
                println!();
                match &plan.previous {
                    Some(previous) => {
                        println!("Log boundary: {}", previous.artifact.source_log_name)
                    }
                    None => println!("Log boundary: none (first run)"),
                }
                if plan.segments.is_empty() {
                    println!("No binlog segments to archive.");
                } else {
                    println!("Segments to archive:");
                    for segment in &plan.segments {
                        println!("  {}", segment);
                    }
                }
            }
        }
    }

    Ok(())
}

fn require_bak_dir(options: &BackupOptions) -> BackupResult<BackupPaths> {
    if options.bak_dir.as_os_str().is_empty() || !options.bak_dir.is_dir() {
        return Err(BackupError::Validation(format!(
            "--bak-dir={} (directory must exist)",
            options.bak_dir.display()
        )));
    }
    Ok(BackupPaths::new(&options.bak_dir))
}

/// History of a kind directory, empty if the directory was never created
fn load_if_present<S: NamingScheme>(dir: &Path) -> BackupResult<BackupHistory<S::Artifact>> {
    if !dir.exists() {
        return Ok(BackupHistory::default());
    }
    history::load::<S>(dir)
}

fn print_expired<A: Artifact>(label: &str, history: &BackupHistory<A>, ctx: &RunContext) {
    let expired = retention::expired(history, &ctx.policy);
    if expired.is_empty() {
        println!("No expired {} backups.", label);
        return;
    }
    println!("Expired {} backups ({}):", label, expired.len());
    for entry in expired {
        println!("  {}", entry.file_name);
    }
}

fn print_data_outcome(outcome: &RunOutcome<DataReport>) {
    if !outcome.pruned.deleted.is_empty() {
        println!("Pruned {} expired data backup(s)", outcome.pruned.deleted.len());
    }
    match &outcome.report {
        DataReport::Published { path, artifact } => {
            print_published(path, artifact);
        }
        DataReport::DryRun { command } => {
            println!("EXECUTE: {}", command);
        }
    }
}

fn print_published(path: &Path, artifact: &DataArtifact) {
    println!("{} backup published: {}", artifact.kind, path.display());
    println!("Checkpoint: {}", artifact.checkpoint);
}

fn print_logs_outcome(outcome: &RunOutcome<LogsReport>) {
    let report = &outcome.report;
    if !outcome.pruned.deleted.is_empty() {
        println!("Pruned {} expired log backup(s)", outcome.pruned.deleted.len());
    }
    if report.dry_run {
        for command in &report.commands {
            println!("EXECUTE: {}", command);
        }
        return;
    }

    println!("Compressed {} binlog segment(s)", report.compressed.len());
    if let Some(retired) = &report.retired {
        println!("Replaced {}", retired.display());
    }
    for (segment, reason) in &report.failed {
        println!("  FAILED {}: {}", segment, reason);
    }
}

fn file_size(path: &Path) -> String {
    std::fs::metadata(path)
        .map(|m| format_size(m.len()))
        .unwrap_or_else(|_| "?".to_string())
}

/// Binary size with one decimal, e.g. `2.0 KB`
fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit + 1 < UNITS.len() {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

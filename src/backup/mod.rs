//! Backup orchestration
//!
//! Provides the two backup kinds as strategies driven by one orchestrator.
//!
//! # Architecture
//!
//! - `BackupStrategy`: what differs per kind (history naming, planning,
//!   the pipeline that produces artifacts)
//! - `DataBackup`: weekly full + incremental xbstream snapshots
//! - `LogsBackup`: per-segment binlog compression
//! - `Orchestrator`: the shared lifecycle: prepare the directory, prune
//!   expired artifacts, plan, then run the pipeline
//!
//! Kinds run sequentially; the data backup finishes before binlogs start.
//!
//! # Example
//!
//! ```rust,ignore
//! use mysql_backup::backup::{run_backups, RunContext};
//! use mysql_backup::process::SystemRunner;
//!
//! options.validate()?;
//! let ctx = RunContext::from_options(&options, today)?;
//! let summary = run_backups(&options, &ctx, &SystemRunner::new())?;
//! ```

mod data;
mod logs;

pub use data::{extract_checkpoint, DataBackup, DataReport, CHECKPOINT_MARKER, TEMP_FILE_NAME};
pub use logs::{list_segments, select_segments, LogPlan, LogsBackup, LogsReport};

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use tracing::info;

use crate::config::paths::ensure_dir;
use crate::config::{BackupOptions, BackupPaths};
use crate::error::BackupResult;
use crate::history::{self, BackupHistory};
use crate::models::Artifact;
use crate::naming::NamingScheme;
use crate::process::ProcessRunner;
use crate::retention::{self, PruneReport, RetentionPolicy};

/// Values fixed for the whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub policy: RetentionPolicy,
    pub dry_run: bool,
}

impl RunContext {
    pub fn new(policy: RetentionPolicy, dry_run: bool) -> Self {
        Self { policy, dry_run }
    }

    /// Build the context from validated options and the logical date
    pub fn from_options(options: &BackupOptions, today: NaiveDate) -> BackupResult<Self> {
        let policy = RetentionPolicy::new(options.keep_weeks, options.weekday, today)?;
        Ok(Self::new(policy, options.dry_run))
    }
}

/// Behaviour that differs between backup kinds
pub trait BackupStrategy {
    /// Artifact type stored by this kind
    type Item: Artifact;
    /// File naming for this kind
    type Scheme: NamingScheme<Artifact = Self::Item>;
    /// Decision made before running the pipeline
    type Plan: fmt::Debug;
    /// Result of running the pipeline
    type Report;

    /// Short name used in logs
    fn label(&self) -> &'static str;

    /// Directory holding this kind's artifacts
    fn directory(&self) -> &Path;

    /// Current artifacts of this kind, oldest first
    fn list_history(&self) -> BackupResult<BackupHistory<Self::Item>> {
        history::load::<Self::Scheme>(self.directory())
    }

    /// Decide what the pipeline should do
    fn plan_next(
        &self,
        history: &BackupHistory<Self::Item>,
        ctx: &RunContext,
    ) -> BackupResult<Self::Plan>;

    /// Produce and publish artifacts
    fn run_pipeline(
        &self,
        plan: Self::Plan,
        ctx: &RunContext,
        runner: &dyn ProcessRunner,
    ) -> BackupResult<Self::Report>;
}

/// Outcome of one strategy run
#[derive(Debug)]
pub struct RunOutcome<R> {
    pub pruned: PruneReport,
    pub report: R,
}

/// Drives strategies through prune, plan and pipeline
pub struct Orchestrator<'a> {
    ctx: &'a RunContext,
    runner: &'a dyn ProcessRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(ctx: &'a RunContext, runner: &'a dyn ProcessRunner) -> Self {
        Self { ctx, runner }
    }

    /// Run one backup kind to completion
    pub fn run<S: BackupStrategy>(&self, strategy: &S) -> BackupResult<RunOutcome<S::Report>> {
        let dir = strategy.directory();
        ensure_dir(dir)?;

        let history = strategy.list_history()?;
        let pruned = retention::prune(dir, &history, &self.ctx.policy, self.ctx.dry_run);
        let history = if pruned.deleted.is_empty() {
            history
        } else {
            strategy.list_history()?
        };

        let plan = strategy.plan_next(&history, self.ctx)?;
        info!(
            op = "backup.plan",
            kind = strategy.label(),
            history = history.len(),
            plan = ?plan,
            "Planned backup"
        );

        let report = strategy.run_pipeline(plan, self.ctx, self.runner)?;
        Ok(RunOutcome { pruned, report })
    }
}

/// Results of a full invocation
#[derive(Debug, Default)]
pub struct RunSummary {
    pub data: Option<RunOutcome<DataReport>>,
    pub logs: Option<RunOutcome<LogsReport>>,
}

/// Run every backup kind selected by the options
///
/// Options must already be validated. A fatal error in the data backup stops
/// the run before binlogs are archived.
pub fn run_backups(
    options: &BackupOptions,
    ctx: &RunContext,
    runner: &dyn ProcessRunner,
) -> BackupResult<RunSummary> {
    let paths = BackupPaths::new(&options.bak_dir);
    let orchestrator = Orchestrator::new(ctx, runner);
    let mut summary = RunSummary::default();

    if options.mode.includes_data() {
        let strategy = DataBackup::from_options(paths.data_dir(), options);
        summary.data = Some(orchestrator.run(&strategy)?);
    }

    if options.mode.includes_logs() {
        let strategy = LogsBackup::from_options(paths.logs_dir(), options)?;
        summary.logs = Some(orchestrator.run(&strategy)?);
    }

    Ok(summary)
}

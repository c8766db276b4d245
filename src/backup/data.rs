//! Data snapshot backups
//!
//! Runs the backup tool in xbstream mode piped into the compressor, writing to
//! a temporary file. The tool reports the checkpoint it reached on a marker
//! line; only when that line was seen is the temporary file renamed to its
//! final name. The rename is the single publish point, so the directory never
//! holds a partially written artifact under a valid name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::{BackupStrategy, RunContext};
use crate::config::BackupOptions;
use crate::error::{BackupError, BackupResult};
use crate::history::BackupHistory;
use crate::models::DataArtifact;
use crate::naming::{DataNaming, NamingScheme};
use crate::planner::{self, BackupPlan};
use crate::process::{CommandLine, Pipeline, ProcessRunner};

/// Name of the file the pipeline writes to before publishing
pub const TEMP_FILE_NAME: &str = "tmp_backup.xb.zst";

/// Text of the line on which xtrabackup and mariabackup report the checkpoint
pub const CHECKPOINT_MARKER: &str = "The latest check point (for incremental)";

/// Result of a data backup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataReport {
    /// A new artifact was published
    Published { path: PathBuf, artifact: DataArtifact },
    /// Nothing ran; this is the command that would have
    DryRun { command: String },
}

/// Weekly full + incremental snapshots
#[derive(Debug, Clone)]
pub struct DataBackup {
    dir: PathBuf,
    executor: String,
    my_cnf: PathBuf,
    parallel: u32,
    compressor: String,
    compress_threads: u32,
}

impl DataBackup {
    pub fn from_options(dir: PathBuf, options: &BackupOptions) -> Self {
        Self {
            dir,
            executor: options.executor.clone(),
            my_cnf: options.my_cnf.clone(),
            parallel: options.parallel,
            compressor: options.compressor.clone(),
            compress_threads: options.compress_threads,
        }
    }

    /// Path the pipeline writes to
    pub fn temp_path(&self) -> PathBuf {
        self.dir.join(TEMP_FILE_NAME)
    }

    /// Backup tool piped into the compressor
    pub fn command(&self, plan: &BackupPlan) -> Pipeline {
        let mut tool = CommandLine::new(&self.executor)
            .arg(format!("--defaults-file={}", self.my_cnf.display()))
            .arg("--backup")
            .arg(format!("--parallel={}", self.parallel))
            .arg("--stream=xbstream")
            .arg("--target-dir=/tmp");
        if !plan.is_full() {
            tool = tool.arg(format!("--incremental-lsn={}", plan.base_checkpoint));
        }

        let compress = CommandLine::new(&self.compressor)
            .arg(format!("-fkT{}", self.compress_threads))
            .arg("-o")
            .arg(self.temp_path().display().to_string());

        Pipeline::new(vec![tool, compress])
    }

    /// Remove the temporary file, tolerating its absence
    fn discard_temp(&self) {
        let temp = self.temp_path();
        match fs::remove_file(&temp) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                op = "data.discard.error",
                file = %temp.display(),
                error = %e,
                "Failed to remove temporary backup file"
            ),
        }
    }

    fn publish(
        &self,
        plan: BackupPlan,
        checkpoint: String,
        ctx: &RunContext,
    ) -> BackupResult<DataReport> {
        let temp = self.temp_path();
        let artifact = match DataArtifact::new(
            ctx.policy.today,
            plan.kind,
            plan.base_checkpoint,
            checkpoint,
        ) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.discard_temp();
                return Err(e);
            }
        };

        let path = self.dir.join(DataNaming::encode(&artifact));
        fs::rename(&temp, &path).map_err(|e| BackupError::Publish {
            from: temp.clone(),
            to: path.clone(),
            reason: e.to_string(),
        })?;

        info!(
            op = "data.success",
            file = %path.display(),
            kind = %artifact.kind,
            checkpoint = %artifact.checkpoint,
            "SUCCESS"
        );
        Ok(DataReport::Published { path, artifact })
    }
}

impl BackupStrategy for DataBackup {
    type Item = DataArtifact;
    type Scheme = DataNaming;
    type Plan = BackupPlan;
    type Report = DataReport;

    fn label(&self) -> &'static str {
        "data"
    }

    fn directory(&self) -> &Path {
        &self.dir
    }

    fn plan_next(
        &self,
        history: &BackupHistory<DataArtifact>,
        ctx: &RunContext,
    ) -> BackupResult<BackupPlan> {
        Ok(planner::plan_next(history, &ctx.policy))
    }

    fn run_pipeline(
        &self,
        plan: BackupPlan,
        ctx: &RunContext,
        runner: &dyn ProcessRunner,
    ) -> BackupResult<DataReport> {
        let pipeline = self.command(&plan);
        let command = pipeline.script();
        info!(op = "data.execute", command = %command, "EXECUTE");

        if ctx.dry_run {
            return Ok(DataReport::DryRun { command });
        }

        let mut child = match runner.spawn(&pipeline) {
            Ok(child) => child,
            Err(e) => {
                self.discard_temp();
                return Err(e);
            }
        };

        let mut checkpoint = None;
        for line in child.lines() {
            match line {
                Ok(line) => {
                    info!(op = "data.tool.output", "{}", line);
                    if let Some(value) = extract_checkpoint(&line) {
                        checkpoint = Some(value);
                    }
                }
                Err(e) => {
                    warn!(op = "data.tool.read_error", error = %e, "Failed to read tool output");
                    break;
                }
            }
        }

        let exit = match child.wait() {
            Ok(exit) => exit,
            Err(e) => {
                self.discard_temp();
                return Err(BackupError::Process {
                    command,
                    reason: e.to_string(),
                });
            }
        };

        let Some(checkpoint) = checkpoint else {
            self.discard_temp();
            let temp_file = self.temp_path();
            error!(
                op = "data.failure",
                file = %temp_file.display(),
                exit = %exit,
                "FAILURE"
            );
            return Err(BackupError::CheckpointMissing { temp_file });
        };

        if !exit.success() {
            warn!(
                op = "data.exit_status",
                exit = %exit,
                "Backup pipeline exited unsuccessfully after reporting a checkpoint"
            );
        }

        self.publish(plan, checkpoint, ctx)
    }
}

/// Checkpoint value from a marker line, if the line is one
///
/// The value is the text between the first pair of single quotes:
/// `xtrabackup: The latest check point (for incremental): '26371094'`.
pub fn extract_checkpoint(line: &str) -> Option<String> {
    if !line.contains(CHECKPOINT_MARKER) {
        return None;
    }
    let value = line.split('\'').nth(1)?;
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

//! Binlog archiving
//!
//! Every qualifying segment is compressed on its own into the logs directory.
//! The newest archived segment is the boundary of the next run: it is
//! compressed again (it may have grown since) along with everything after it.
//! The first run only seeds the chain with the newest segment.
//!
//! Each segment is compressed into a temporary file and renamed to its
//! canonical name only when the compressor succeeds, so a failed rerun never
//! destroys an archive published earlier.

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::{BackupStrategy, RunContext};
use crate::config::options::log_bin_basename;
use crate::config::BackupOptions;
use crate::error::{BackupError, BackupResult};
use crate::history::{self, BackupHistory, HistoryEntry};
use crate::models::LogArtifact;
use crate::naming::{LogNaming, NamingScheme};
use crate::process::{CommandLine, Pipeline, ProcessRunner};

/// Name of the file a segment is compressed into before publishing
pub const TEMP_FILE_NAME: &str = "tmp_binlog.zst";

/// Segments to compress and the artifact they supersede
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPlan {
    /// Segment file names, oldest first
    pub segments: Vec<String>,
    /// Newest log artifact before this run
    pub previous: Option<HistoryEntry<LogArtifact>>,
}

/// Result of a binlog run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogsReport {
    /// Rendered compression commands, in execution order
    pub commands: Vec<String>,
    /// Artifacts written
    pub compressed: Vec<PathBuf>,
    /// Segments that failed, with the reason
    pub failed: Vec<(String, String)>,
    /// Superseded boundary artifact that was removed
    pub retired: Option<PathBuf>,
    pub dry_run: bool,
}

/// Per-segment binlog compression
#[derive(Debug, Clone)]
pub struct LogsBackup {
    dir: PathBuf,
    log_dir: PathBuf,
    basename: String,
    compressor: String,
    compress_threads: u32,
}

impl LogsBackup {
    /// Build from options; `log_bin` is split into directory and basename
    pub fn from_options(dir: PathBuf, options: &BackupOptions) -> BackupResult<Self> {
        let log_bin = options
            .log_bin
            .as_ref()
            .ok_or_else(|| BackupError::Validation("--log-bin is required for log backups".into()))?;

        let basename = log_bin_basename(log_bin)?.to_string();

        let log_dir = match log_bin.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Ok(Self {
            dir,
            log_dir,
            basename,
            compressor: options.compressor.clone(),
            compress_threads: options.compress_threads,
        })
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Path a segment is compressed into
    pub fn temp_path(&self) -> PathBuf {
        self.dir.join(TEMP_FILE_NAME)
    }

    /// Compression of one segment into the temporary file
    pub fn command(&self, segment: &str) -> Pipeline {
        CommandLine::new(&self.compressor)
            .arg(format!("-fkT{}", self.compress_threads))
            .arg(self.log_dir.join(segment).display().to_string())
            .arg("-o")
            .arg(self.temp_path().display().to_string())
            .into()
    }

    /// Compress, then move the result to `output`
    ///
    /// On failure only the temporary file is removed; `output` is untouched.
    fn archive(
        &self,
        pipeline: &Pipeline,
        output: &Path,
        runner: &dyn ProcessRunner,
    ) -> BackupResult<()> {
        let temp = self.temp_path();
        let result = self.compress(pipeline, runner).and_then(|()| {
            fs::rename(&temp, output).map_err(|e| BackupError::Publish {
                from: temp.clone(),
                to: output.to_path_buf(),
                reason: e.to_string(),
            })
        });

        if result.is_err() {
            if let Err(e) = fs::remove_file(&temp) {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(op = "logs.discard.error", file = %temp.display(), error = %e);
                }
            }
        }
        result
    }

    fn compress(&self, pipeline: &Pipeline, runner: &dyn ProcessRunner) -> BackupResult<()> {
        let command = pipeline.script();
        let mut child = runner.spawn(pipeline)?;
        for line in child.lines() {
            match line {
                Ok(line) => info!(op = "logs.tool.output", "{}", line),
                Err(e) => {
                    warn!(op = "logs.tool.read_error", error = %e, "Failed to read compressor output");
                    break;
                }
            }
        }

        let exit = child.wait().map_err(|e| BackupError::Process {
            command: command.clone(),
            reason: e.to_string(),
        })?;
        if exit.success() {
            Ok(())
        } else {
            Err(BackupError::Process {
                command,
                reason: exit.to_string(),
            })
        }
    }

    /// Remove the previous boundary artifact once its segment is archived again
    fn retire(&self, previous: &HistoryEntry<LogArtifact>, replacement: &str) -> Option<PathBuf> {
        if previous.file_name == replacement {
            return None;
        }

        let path = previous.path_in(&self.dir);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(
                    op = "logs.retire",
                    file = %previous.file_name,
                    replacement = %replacement,
                    "Removed superseded log backup"
                );
                Some(path)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(
                    op = "logs.retire.error",
                    file = %previous.file_name,
                    error = %e,
                    "Failed to remove superseded log backup"
                );
                None
            }
        }
    }
}

impl BackupStrategy for LogsBackup {
    type Item = LogArtifact;
    type Scheme = LogNaming;
    type Plan = LogPlan;
    type Report = LogsReport;

    fn label(&self) -> &'static str {
        "logs"
    }

    fn directory(&self) -> &Path {
        &self.dir
    }

    fn plan_next(
        &self,
        history: &BackupHistory<LogArtifact>,
        _ctx: &RunContext,
    ) -> BackupResult<LogPlan> {
        let previous = history.last().cloned();
        let boundary = previous
            .as_ref()
            .map(|entry| entry.artifact.source_log_name.as_str());
        let segments = list_segments(&self.log_dir, &self.basename)?;

        Ok(LogPlan {
            segments: select_segments(segments, &self.basename, boundary),
            previous,
        })
    }

    fn run_pipeline(
        &self,
        plan: LogPlan,
        ctx: &RunContext,
        runner: &dyn ProcessRunner,
    ) -> BackupResult<LogsReport> {
        let mut report = LogsReport {
            dry_run: ctx.dry_run,
            ..LogsReport::default()
        };

        if plan.segments.is_empty() {
            warn!(
                op = "logs.scan.empty",
                log_dir = %self.log_dir.display(),
                basename = %self.basename,
                "No binlog segments found"
            );
        }

        for segment in &plan.segments {
            let artifact = LogArtifact::new(ctx.policy.today, segment.as_str())?;
            let file_name = LogNaming::encode(&artifact);
            let output = self.dir.join(&file_name);
            let pipeline = self.command(segment);
            let command = pipeline.script();
            info!(op = "logs.execute", command = %command, file = %file_name, "EXECUTE");
            report.commands.push(command);

            if ctx.dry_run {
                continue;
            }

            match self.archive(&pipeline, &output, runner) {
                Ok(()) => {
                    info!(op = "logs.success", file = %file_name, "SUCCESS");
                    report.compressed.push(output);
                    if let Some(previous) = plan
                        .previous
                        .as_ref()
                        .filter(|p| p.artifact.source_log_name == *segment)
                    {
                        report.retired = self.retire(previous, &file_name);
                    }
                }
                Err(e) => {
                    error!(op = "logs.failure", segment = %segment, error = %e, "FAILURE");
                    report.failed.push((segment.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

/// Numeric suffix of a segment name, `None` for anything else
fn segment_number(name: &str, basename: &str) -> Option<u64> {
    let digits = name.strip_prefix(basename)?.strip_prefix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn compare_segments(a: &str, b: &str, basename: &str) -> Ordering {
    match (segment_number(a, basename), segment_number(b, basename)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Binlog segments of `basename` in `log_dir`, oldest first
///
/// The index file and anything else without a numeric suffix is ignored.
pub fn list_segments(log_dir: &Path, basename: &str) -> BackupResult<Vec<String>> {
    let mut segments = history::list(log_dir, |name| segment_number(name, basename).is_some())?;
    segments.sort_by(|a, b| compare_segments(a, b, basename));
    Ok(segments)
}

/// Segments a run should compress
///
/// With a boundary, every segment at or after it; without one, only the
/// newest segment.
pub fn select_segments(
    mut segments: Vec<String>,
    basename: &str,
    boundary: Option<&str>,
) -> Vec<String> {
    match boundary {
        Some(boundary) => {
            segments.retain(|s| compare_segments(s, boundary, basename) != Ordering::Less);
            segments
        }
        None => segments.pop().into_iter().collect(),
    }
}

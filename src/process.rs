//! Subprocess execution
//!
//! The backup tool and the compressor are external programs. They are run
//! through [`ProcessRunner`] so the orchestrator can be exercised against a
//! scripted fake.
//!
//! Output of every stage (stdout and stderr) is merged into one pipe and read
//! line by line while the child runs. A child that fills its pipe buffer
//! therefore never blocks on a reader that is waiting for it to exit.

use std::fmt;
use std::io::{self, BufRead, BufReader};
use std::process::{Child, ChildStdout, Command, Stdio};

use crate::error::{BackupError, BackupResult};

/// A single program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Value following `flag` in the argument list
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let words = std::iter::once(&self.program).chain(&self.args);
        write!(f, "{}", shell_words::join(words))
    }
}

/// Commands connected stdout to stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<CommandLine>,
}

impl Pipeline {
    pub fn new(stages: Vec<CommandLine>) -> Self {
        Self { stages }
    }

    /// Shell script equivalent of the pipeline
    pub fn script(&self) -> String {
        self.to_string()
    }

    pub fn last_stage(&self) -> Option<&CommandLine> {
        self.stages.last()
    }
}

impl From<CommandLine> for Pipeline {
    fn from(command: CommandLine) -> Self {
        Self::new(vec![command])
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.stages.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(" | "))
    }
}

/// Exit status of a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// A running process with a merged output stream
pub trait ChildProcess {
    /// Next output line without its terminator, `None` at end of stream
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Wait for the process to exit
    fn wait(&mut self) -> io::Result<ProcessExit>;
}

impl dyn ChildProcess {
    /// Iterate over the remaining output lines
    pub fn lines(&mut self) -> OutputLines<'_, Self> {
        OutputLines { child: self }
    }
}

/// Lines of a child's output, consumed once
pub struct OutputLines<'a, C: ?Sized> {
    child: &'a mut C,
}

impl<C: ChildProcess + ?Sized> Iterator for OutputLines<'_, C> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.child.read_line().transpose()
    }
}

/// Capability to start pipelines
pub trait ProcessRunner {
    fn spawn(&self, pipeline: &Pipeline) -> BackupResult<Box<dyn ChildProcess>>;
}

/// Runs pipelines through `sh`
#[derive(Debug, Clone)]
pub struct SystemRunner {
    shell: String,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner for SystemRunner {
    fn spawn(&self, pipeline: &Pipeline) -> BackupResult<Box<dyn ChildProcess>> {
        let script = pipeline.script();
        // Redirect stderr of the whole script into the stdout pipe
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(format!("exec 2>&1; {}", script))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| BackupError::Process {
                command: script.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| BackupError::Process {
            command: script,
            reason: "stdout was not captured".to_string(),
        })?;

        Ok(Box::new(SystemChild {
            child,
            reader: BufReader::new(stdout),
        }))
    }
}

struct SystemChild {
    child: Child,
    reader: BufReader<ChildStdout>,
}

impl ChildProcess for SystemChild {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = Vec::new();
        if self.reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn wait(&mut self) -> io::Result<ProcessExit> {
        let status = self.child.wait()?;
        Ok(ProcessExit {
            code: status.code(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted process runner for orchestrator tests

    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    type SpawnHook = Box<dyn Fn(&Pipeline)>;

    /// Behaviour of one scripted spawn
    #[derive(Debug, Clone, Default)]
    pub struct Script {
        pub lines: Vec<String>,
        pub exit_code: i32,
        pub fail_spawn: bool,
    }

    impl Script {
        pub fn lines(lines: &[&str]) -> Self {
            Self {
                lines: lines.iter().map(|l| l.to_string()).collect(),
                ..Self::default()
            }
        }

        pub fn exit(mut self, code: i32) -> Self {
            self.exit_code = code;
            self
        }
    }

    /// Replays scripts in order and records every pipeline it was asked to run
    ///
    /// The hook runs at spawn time and stands in for the side effects of the
    /// real programs, such as the compressor creating its output file.
    pub struct ScriptedRunner {
        scripts: RefCell<VecDeque<Script>>,
        hook: SpawnHook,
        pub spawned: RefCell<Vec<Pipeline>>,
    }

    impl ScriptedRunner {
        pub fn new(scripts: Vec<Script>) -> Self {
            Self {
                scripts: RefCell::new(scripts.into()),
                hook: Box::new(|_| {}),
                spawned: RefCell::new(Vec::new()),
            }
        }

        pub fn with_hook(mut self, hook: impl Fn(&Pipeline) + 'static) -> Self {
            self.hook = Box::new(hook);
            self
        }

        pub fn spawn_count(&self) -> usize {
            self.spawned.borrow().len()
        }
    }

    /// Hook that creates the file named by the last stage's `-o` argument
    pub fn create_output(pipeline: &Pipeline) {
        if let Some(path) = pipeline.last_stage().and_then(|s| s.value_of("-o")) {
            std::fs::write(path, b"compressed").unwrap();
        }
    }

    impl ProcessRunner for ScriptedRunner {
        fn spawn(&self, pipeline: &Pipeline) -> BackupResult<Box<dyn ChildProcess>> {
            self.spawned.borrow_mut().push(pipeline.clone());
            let script = self.scripts.borrow_mut().pop_front().unwrap_or_default();
            if script.fail_spawn {
                return Err(BackupError::Process {
                    command: pipeline.script(),
                    reason: "No such file or directory".to_string(),
                });
            }
            (self.hook)(pipeline);
            Ok(Box::new(ScriptedChild {
                lines: script.lines.into(),
                exit_code: script.exit_code,
            }))
        }
    }

    struct ScriptedChild {
        lines: VecDeque<String>,
        exit_code: i32,
    }

    impl ChildProcess for ScriptedChild {
        fn read_line(&mut self) -> io::Result<Option<String>> {
            Ok(self.lines.pop_front())
        }

        fn wait(&mut self) -> io::Result<ProcessExit> {
            Ok(ProcessExit {
                code: Some(self.exit_code),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_with_equals_is_not_an_assignment() {
        let cmd = CommandLine::new("tool=v2").arg("--backup");
        assert_eq!(cmd.to_string(), "'tool=v2' --backup");
    }

    #[test]
    fn test_rendered_command_splits_back_to_words() {
        let cmd = CommandLine::new("/opt/percona tools/xtrabackup")
            .arg("--defaults-file=/etc/my.cnf")
            .arg("it's")
            .arg("");
        let words = shell_words::split(&cmd.to_string()).unwrap();

        let mut expected = vec![cmd.program.clone()];
        expected.extend(cmd.args.iter().cloned());
        assert_eq!(words, expected);
    }

    #[test]
    fn test_pipeline_display() {
        let pipeline = Pipeline::new(vec![
            CommandLine::new("xtrabackup").arg("--backup"),
            CommandLine::new("zstd").arg("-o").arg("/backup/data/tmp backup"),
        ]);
        assert_eq!(
            pipeline.to_string(),
            "xtrabackup --backup | zstd -o '/backup/data/tmp backup'"
        );
    }

    #[test]
    fn test_value_of() {
        let cmd = CommandLine::new("zstd").arg("-fkT4").arg("in").arg("-o").arg("out");
        assert_eq!(cmd.value_of("-o"), Some("out"));
        assert_eq!(cmd.value_of("-q"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_merges_output() {
        let pipeline = Pipeline::new(vec![
            CommandLine::new("echo").arg("first"),
            CommandLine::new("cat"),
        ]);
        let mut child = SystemRunner::new().spawn(&pipeline).unwrap();
        let lines: Vec<String> = child.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["first".to_string()]);
        assert!(child.wait().unwrap().success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_runs_program_named_with_equals() {
        let temp = tempfile::TempDir::new().unwrap();
        let program = temp.path().join("tool=v2");
        std::fs::write(&program, "#!/bin/sh\necho ran \"$1\"\n").unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let pipeline: Pipeline = CommandLine::new(program.display().to_string())
            .arg("--backup")
            .into();
        let mut child = SystemRunner::new().spawn(&pipeline).unwrap();
        let lines: Vec<String> = child.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["ran --backup".to_string()]);
        assert!(child.wait().unwrap().success());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_stderr_and_exit_code() {
        let pipeline: Pipeline = CommandLine::new("sh")
            .arg("-c")
            .arg("echo out; echo err >&2; exit 3")
            .into();
        let mut child = SystemRunner::new().spawn(&pipeline).unwrap();
        let lines: Vec<String> = child.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["out".to_string(), "err".to_string()]);

        let exit = child.wait().unwrap();
        assert_eq!(exit.code, Some(3));
        assert!(!exit.success());
    }
}

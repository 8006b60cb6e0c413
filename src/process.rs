//! # External Tool Invocation
//!
//! Every external CLI the pipeline drives (the schema extractor, both
//! client generators, version probes, the monorepo build) goes through
//! the [`ToolRunner`] trait so stages can be tested against a mock
//! without spawning anything.
//!
//! The contract is deliberately narrow:
//!
//! - argv-style only ([`CommandSpec`]); no shell string evaluation
//! - synchronous interface with the timeout enforced internally
//! - a process that launches and then exits non-zero, or overruns its
//!   timeout, is a *result* ([`ProcessOutput`]), not an error; stages
//!   record it as a failed per-zone outcome. Only failure to launch or
//!   collect output is a [`RunnerError`].

use crate::error::RunnerError;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How often the runner polls a child for exit while the timeout runs down.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Specification of a command to execute: program, discrete arguments,
/// optional working directory and environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Build a spec from a configured argv (`["npx", "@hey-api/openapi-ts"]`).
    /// Returns `None` for an empty argv.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: None,
            env: Vec::new(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// One-line rendering for logs and diagnostic files.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

/// Captured output of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed (by signal or by the timeout).
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ProcessOutput {
    /// Successful completion: exit code 0 and no timeout.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }

    /// stdout and stderr concatenated, for error messages and diagnostics.
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Shorthand for a zero-exit output, used by mocks.
    pub fn ok() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    /// Shorthand for a non-zero exit with the given stderr, used by mocks.
    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code: Some(1),
            ..Self::default()
        }
    }

    /// Shorthand for a timed-out invocation, used by mocks.
    pub fn timeout() -> Self {
        Self {
            exit_code: None,
            timed_out: true,
            ..Self::default()
        }
    }
}

/// Executes a command with a bounded timeout.
///
/// Implementations must use argv-style APIs only and must not expose the
/// timeout mechanism to callers; a timeout surfaces as
/// `ProcessOutput { timed_out: true, .. }`.
pub trait ToolRunner: Send + Sync {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError>;
}

/// Real runner backed by `std::process`.
///
/// Output pipes are drained on reader threads while the parent polls
/// `try_wait`; on deadline the child is killed and the invocation is
/// reported as timed out rather than as an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        debug!(command = %cmd.display(), timeout_secs = timeout.as_secs(), "running external tool");

        let mut child = cmd
            .to_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RunnerError::Launch {
                program: cmd.program.clone(),
                source: e,
            })?;

        let stdout_reader = spawn_reader(child.stdout.take());
        let stderr_reader = spawn_reader(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break Some(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        warn!(command = %cmd.display(), "tool exceeded timeout, killing");
                        kill_child(&mut child);
                        break None;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    kill_child(&mut child);
                    return Err(RunnerError::Capture {
                        program: cmd.program.clone(),
                        source: e,
                    });
                }
            }
        };

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);

        match status {
            Some(status) => Ok(ProcessOutput {
                stdout,
                stderr,
                exit_code: status.code(),
                timed_out: false,
            }),
            None => Ok(ProcessOutput {
                stdout,
                stderr,
                exit_code: None,
                timed_out: true,
            }),
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> Option<std::thread::JoinHandle<Vec<u8>>> {
    pipe.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            // EOF arrives once the child exits or is killed.
            let _ = reader.read_to_end(&mut buf);
            buf
        })
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<Vec<u8>>>) -> String {
    match handle {
        Some(h) => String::from_utf8_lossy(&h.join().unwrap_or_default()).into_owned(),
        None => String::new(),
    }
}

fn kill_child(child: &mut Child) {
    let _ = child.kill();
    // Reap so the kill doesn't leave a zombie behind.
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let cmd = CommandSpec::new("npx")
            .arg("@hey-api/openapi-ts")
            .args(["--input", "schema.yaml"])
            .cwd("/tmp")
            .env("CI", "1");

        assert_eq!(cmd.program, "npx");
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(cmd.env, vec![("CI".to_string(), "1".to_string())]);
        assert_eq!(cmd.display(), "npx @hey-api/openapi-ts --input schema.yaml");
    }

    #[test]
    fn test_command_spec_from_argv() {
        let argv = vec!["datamodel-codegen".to_string(), "--version".to_string()];
        let cmd = CommandSpec::from_argv(&argv).unwrap();
        assert_eq!(cmd.program, "datamodel-codegen");
        assert_eq!(cmd.args, vec!["--version".to_string()]);

        assert!(CommandSpec::from_argv(&[]).is_none());
    }

    #[test]
    fn test_process_output_success() {
        assert!(ProcessOutput::ok().success());
        assert!(!ProcessOutput::failed("boom").success());
        assert!(!ProcessOutput::timeout().success());

        // Killed by a signal: no exit code, not a success.
        let killed = ProcessOutput {
            exit_code: None,
            ..ProcessOutput::default()
        };
        assert!(!killed.success());
    }

    #[test]
    fn test_process_output_combined() {
        let both = ProcessOutput {
            stdout: "out".to_string(),
            stderr: "err".to_string(),
            exit_code: Some(1),
            timed_out: false,
        };
        assert_eq!(both.combined(), "out\nerr");
        assert_eq!(ProcessOutput::failed("only err").combined(), "only err");
        assert_eq!(ProcessOutput::ok().combined(), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_captures_output() {
        let runner = SystemRunner;
        let cmd = CommandSpec::new("echo").arg("hello");
        let output = runner.run(&cmd, Duration::from_secs(5)).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_nonzero_exit_is_not_an_error() {
        let runner = SystemRunner;
        let cmd = CommandSpec::new("false");
        let output = runner.run(&cmd, Duration::from_secs(5)).unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(1));
        assert!(!output.timed_out);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_timeout_kills_child() {
        let runner = SystemRunner;
        let cmd = CommandSpec::new("sleep").arg("5");
        let started = Instant::now();
        let output = runner.run(&cmd, Duration::from_millis(200)).unwrap();
        assert!(output.timed_out);
        assert!(!output.success());
        assert!(output.exit_code.is_none());
        // Should come back shortly after the deadline, not after 5s.
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_system_runner_missing_binary_is_launch_error() {
        let runner = SystemRunner;
        let cmd = CommandSpec::new("zonegen-definitely-not-a-binary");
        let err = runner.run(&cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RunnerError::Launch { .. }));
    }
}

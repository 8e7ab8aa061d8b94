use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::{Child, Command};

/// Everything needed to run one external program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Added on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub timeout: Duration,
}

/// Captured result of a finished (or killed) child process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the child was killed by a signal or timed out
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Capability to run child processes.
///
/// Implementations must enforce `spec.timeout` and must not leave the
/// child running once it has expired.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn run(&self, spec: ProcessSpec) -> io::Result<ProcessOutput>;
}

/// Default spawner backed by `tokio::process`
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessSpawner;

/// `execve` refuses files it cannot recognize, such as scripts without `#!`
#[cfg(unix)]
const ENOEXEC: i32 = 8;

/// Interpreter for scripts the kernel refuses to execute directly
#[cfg(unix)]
const FALLBACK_SHELL: &str = "/bin/sh";

impl TokioProcessSpawner {
    fn command(program: &OsStr, args: &[&OsStr], spec: &ProcessSpec) -> Command {
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    fn spawn(spec: &ProcessSpec) -> io::Result<Child> {
        let args: Vec<&OsStr> = spec.args.iter().map(OsStr::new).collect();
        match Self::command(spec.program.as_os_str(), &args, spec).spawn() {
            #[cfg(unix)]
            Err(e) if e.raw_os_error() == Some(ENOEXEC) => {
                log::debug!(
                    "{} is not directly executable, running it with {}",
                    spec.program.display(),
                    FALLBACK_SHELL
                );
                let mut shell_args = vec![spec.program.as_os_str()];
                shell_args.extend(args.iter().copied());
                Self::command(OsStr::new(FALLBACK_SHELL), &shell_args, spec).spawn()
            }
            other => other,
        }
    }
}

#[async_trait]
impl ProcessSpawner for TokioProcessSpawner {
    async fn run(&self, spec: ProcessSpec) -> io::Result<ProcessOutput> {
        let child = Self::spawn(&spec)?;

        // Dropping the wait future on timeout drops the child, which kills it
        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(ProcessOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    exit_code: output.status.code(),
                    timed_out: false,
                })
            }
            Err(_) => {
                log::warn!(
                    "Process {} timed out after {:?}",
                    spec.program.display(),
                    spec.timeout
                );
                Ok(ProcessOutput {
                    timed_out: true,
                    ..ProcessOutput::default()
                })
            }
        }
    }
}

/// Outcome of a lifecycle hook
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exit_code: i32,
}

impl HookResult {
    /// Result for a hook the manifest does not declare
    pub fn skipped() -> Self {
        Self {
            success: true,
            output: String::new(),
            error: None,
            exit_code: 0,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
            exit_code: 1,
        }
    }

    /// Message suitable for an error: stderr, then the error text, then the exit code
    pub fn failure_message(&self) -> String {
        match &self.error {
            Some(error) if !error.trim().is_empty() => error.trim().to_string(),
            _ => format!("exited with code {}", self.exit_code),
        }
    }
}

impl From<ProcessOutput> for HookResult {
    fn from(output: ProcessOutput) -> Self {
        if output.success() {
            return Self {
                success: true,
                output: output.stdout,
                error: None,
                exit_code: 0,
            };
        }

        let error = if output.timed_out {
            "Hook timed out".to_string()
        } else if output.stderr.trim().is_empty() {
            format!("Hook exited with code {}", output.exit_code.unwrap_or(1))
        } else {
            output.stderr
        };

        Self {
            success: false,
            output: output.stdout,
            error: Some(error),
            exit_code: output.exit_code.unwrap_or(1),
        }
    }
}

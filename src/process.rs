//! External process execution.
//!
//! Every wrapped tool (clang-tidy, clang-format, doxygen, cmake, the test
//! binaries, native installers) goes through [`ProcessRunner::run`]. Launch
//! failures are retried a bounded number of times with a fixed delay; a
//! process that starts and exits non-zero is returned as-is and never retried.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_LAUNCH_ATTEMPTS: u32 = 10;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Routing for one standard stream of a child process.
#[derive(Debug, Default)]
pub enum StdioRoute {
    /// Discarded.
    #[default]
    Ignore,
    /// Collected into [`ProcessResult`].
    Capture,
    /// Shared with this process.
    Inherit,
    /// Bound to an already-open file.
    File(File),
}

impl StdioRoute {
    fn to_stdio(&self) -> io::Result<Stdio> {
        Ok(match self {
            StdioRoute::Ignore => Stdio::null(),
            StdioRoute::Capture => Stdio::piped(),
            StdioRoute::Inherit => Stdio::inherit(),
            StdioRoute::File(file) => Stdio::from(file.try_clone()?),
        })
    }
}

/// A single external-process call.
#[derive(Debug)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdin: StdioRoute,
    pub stdout: StdioRoute,
    pub stderr: StdioRoute,
}

impl Invocation {
    /// Captures stdout and stderr; stdin is closed.
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            stdin: StdioRoute::Ignore,
            stdout: StdioRoute::Capture,
            stderr: StdioRoute::Capture,
        }
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

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn stdin(mut self, route: StdioRoute) -> Self {
        self.stdin = route;
        self
    }

    pub fn stdout(mut self, route: StdioRoute) -> Self {
        self.stdout = route;
        self
    }

    pub fn stderr(mut self, route: StdioRoute) -> Self {
        self.stderr = route;
        self
    }

    /// Program name for messages.
    pub fn display_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Outcome of a launched process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessResult {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    pub fn exit_label(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Starts a process and waits for it. An `Err` means the launch itself failed.
pub trait Launcher: Send + Sync {
    fn launch(&self, invocation: &Invocation) -> io::Result<ProcessResult>;
}

/// Launches real processes through `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl Launcher for SystemLauncher {
    fn launch(&self, invocation: &Invocation) -> io::Result<ProcessResult> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .stdin(invocation.stdin.to_stdio()?)
            .stdout(invocation.stdout.to_stdio()?)
            .stderr(invocation.stderr.to_stdio()?);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output()?;
        Ok(ProcessResult {
            code: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[derive(Clone)]
pub struct ProcessRunner {
    launcher: Arc<dyn Launcher>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl ProcessRunner {
    pub fn new(launcher: Arc<dyn Launcher>, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            launcher,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn system() -> Self {
        Self::new(
            Arc::new(SystemLauncher),
            DEFAULT_LAUNCH_ATTEMPTS,
            DEFAULT_RETRY_DELAY,
        )
    }

    /// Run `invocation`, retrying only when the launch fails.
    ///
    /// Returns `None` once every attempt failed to launch; callers treat that
    /// as "tool unusable".
    pub fn run(&self, invocation: &Invocation) -> Option<ProcessResult> {
        for attempt in 1..=self.max_attempts {
            match self.launcher.launch(invocation) {
                Ok(result) => {
                    debug!(
                        program = %invocation.program.display(),
                        attempt,
                        code = ?result.code,
                        "process finished"
                    );
                    return Some(result);
                }
                Err(e) => {
                    debug!(
                        program = %invocation.program.display(),
                        attempt,
                        error = %e,
                        "launch failed"
                    );
                    if attempt < self.max_attempts && !self.retry_delay.is_zero() {
                        std::thread::sleep(self.retry_delay);
                    }
                }
            }
        }

        warn!(
            "giving up on {} after {} launch attempts",
            invocation.program.display(),
            self.max_attempts
        );
        None
    }
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner")
            .field("max_attempts", &self.max_attempts)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

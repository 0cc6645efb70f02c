use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::error::PipelineError;

/// How a child's stdin/stdout is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    Null,
    Piped,
}

impl StdioMode {
    fn stdio(self) -> Stdio {
        match self {
            StdioMode::Null => Stdio::null(),
            StdioMode::Piped => Stdio::piped(),
        }
    }
}

/// Description of one external program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Short name used in logs and errors ("capture", "archive", ...)
    pub name: String,
    pub program: String,
    pub args: Vec<String>,
    pub stdin: StdioMode,
    pub stdout: StdioMode,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            stdin: StdioMode::Null,
            stdout: StdioMode::Null,
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

    pub fn piped_stdin(mut self) -> Self {
        self.stdin = StdioMode::Piped;
        self
    }

    pub fn piped_stdout(mut self) -> Self {
        self.stdout = StdioMode::Piped;
        self
    }

    /// Program and arguments joined for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How a managed process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Terminated on request (stop or sibling failure)
    Killed,
    /// Exited on its own
    Exited(ExitStatus),
    /// Waiting on the process failed
    WaitFailed(String),
}

impl fmt::Display for ProcessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessOutcome::Killed => write!(f, "killed"),
            ProcessOutcome::Exited(status) => write!(f, "exited ({})", status),
            ProcessOutcome::WaitFailed(reason) => write!(f, "wait failed ({})", reason),
        }
    }
}

/// A running external program with an explicit start/wait/kill lifecycle.
///
/// Termination goes through tokio's cross-platform forced kill (SIGKILL on
/// Unix, `TerminateProcess` on Windows); the external binary is never asked
/// to stop cooperatively. The child is also killed if the handle is dropped.
pub struct ManagedProcess {
    name: String,
    child: Child,
}

impl ManagedProcess {
    /// Spawn the process described by `spec`.
    ///
    /// Fails with [`PipelineError::Launch`] when the binary is missing or
    /// cannot be executed. Must be called from within a tokio runtime.
    pub fn start(spec: &ProcessSpec) -> Result<Self, PipelineError> {
        tracing::debug!("Launching {}: {}", spec.name, spec.command_line());

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(spec.stdin.stdio())
            .stdout(spec.stdout.stdio())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::Launch {
                name: spec.name.clone(),
                program: spec.program.clone(),
                reason: e.to_string(),
            })?;

        if let Some(stderr) = child.stderr.take() {
            forward_stderr(spec.name.clone(), stderr);
        }

        tracing::info!(
            "{} started (pid {})",
            spec.name,
            child.id().map(|id| id.to_string()).unwrap_or_default()
        );

        Ok(Self {
            name: spec.name.clone(),
            child,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, or `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.child.stdin.take()
    }

    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Block until the process exits.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully terminate the process and reap it.
    ///
    /// Idempotent: killing a process that already exited is a no-op.
    pub async fn kill(&mut self) -> io::Result<()> {
        match self.child.start_kill() {
            Ok(()) => {}
            // Already reaped by a previous wait()
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => return Ok(()),
            Err(e) => return Err(e),
        }
        self.child.wait().await.map(|_| ())
    }
}

/// Forward a child's stderr into the log, one line per event.
fn forward_stderr(name: String, stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::warn!(process = %name, "{}", line);
        }
    });
}

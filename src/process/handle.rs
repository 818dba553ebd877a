//! Bot process spawning and control.
//!
//! [`BotCommand`] describes what to run; [`ProcessHandle`] owns the spawned
//! child. Arguments are passed straight to the OS, never through a shell.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::Serialize;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};

/// Windows `CREATE_NO_WINDOW` process creation flag.
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The executable was not found.
    #[error("executable not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Builder describing the bot process to launch.
#[derive(Debug, Clone, Default)]
pub struct BotCommand {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    required: Vec<PathBuf>,
    env: BTreeMap<String, String>,
}

impl BotCommand {
    /// Create a command running `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory for the process.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Require a file to exist before spawning.
    #[must_use]
    pub fn require(mut self, path: impl Into<PathBuf>) -> Self {
        self.required.push(path.into());
        self
    }

    /// Set an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn get_working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    #[must_use]
    pub fn get_env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// First required file that does not exist, if any.
    #[must_use]
    pub fn missing_requirement(&self) -> Option<&Path> {
        self.required
            .iter()
            .map(PathBuf::as_path)
            .find(|path| !path.exists())
    }
}

/// Snapshot of a supervised process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    /// OS process id, if the OS reported one.
    pub pid: Option<u32>,
    /// Whether the process is still running as far as the supervisor knows.
    pub running: bool,
    /// Exit code once known. `None` while running or when killed by a signal.
    pub exit_code: Option<i32>,
}

/// A spawned bot process with captured stdout and stderr.
///
/// The child is killed if the handle is dropped while it is still running.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: Option<u32>,
    exit: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Spawn the process described by `command`.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the OS spawn call fails.
    pub fn spawn(command: &BotCommand) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let child = cmd.spawn().map_err(SpawnError::from_io)?;
        let pid = child.id();

        tracing::debug!(program = %command.program, args = ?command.args, ?pid, "Spawned process");

        Ok(Self {
            child,
            pid,
            exit: None,
        })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Process id captured at spawn time.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    #[must_use]
    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            running: self.exit.is_none(),
            exit_code: self.exit.and_then(|status| status.code()),
        }
    }

    /// Check if the process has exited without blocking.
    ///
    /// # Errors
    ///
    /// Returns an error if the process state cannot be queried.
    pub fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        if self.exit.is_none() {
            self.exit = self.child.try_wait()?;
        }
        Ok(self.exit)
    }

    /// Send a kill request without waiting for the exit.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        if self.exit.is_some() {
            return Ok(());
        }
        self.child.start_kill()
    }

    /// Wait for the process to exit and reap it.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self.child.wait().await?;
        self.exit = Some(status);
        Ok(status)
    }

    /// Wait up to `timeout` for the process to exit.
    ///
    /// Returns `Ok(None)` if it is still running when the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }
}

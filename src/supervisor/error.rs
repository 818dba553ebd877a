//! Supervisor error types.

use std::path::PathBuf;

use crate::process::SpawnError;

/// Errors returned synchronously from [`Supervisor::start`](super::Supervisor::start).
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    /// A process is already starting or running.
    #[error("Bot is already running")]
    AlreadyRunning,
    /// A file the command requires does not exist.
    #[error("Required file not found: {}", .0.display())]
    TargetMissing(PathBuf),
    /// The OS refused to spawn the process.
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: SpawnError,
    },
    /// The spawned process had no stdout pipe.
    #[error("Process stdout not available")]
    NoStdout,
}

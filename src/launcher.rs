//! Launcher tying configuration, interpreter discovery and the supervisor
//! together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::LauncherConfig;
use crate::interpreter::{InterpreterLocator, LocateError};
use crate::log::LineClassifier;
use crate::process::{BotCommand, ProcessInfo};
use crate::supervisor::{EventSink, Supervisor, SupervisorError};

/// Errors surfaced when launching the bot.
#[derive(thiserror::Error, Debug)]
pub enum LaunchError {
    /// No interpreter candidate passed its probe.
    #[error(transparent)]
    InterpreterNotFound(#[from] LocateError),
    /// The supervisor refused or failed to start the process.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

/// Launches the configured bot under a [`Supervisor`].
pub struct Launcher {
    config: LauncherConfig,
    locator: InterpreterLocator,
    supervisor: Supervisor,
}

impl Launcher {
    #[must_use]
    pub fn new(config: LauncherConfig, sink: Arc<dyn EventSink>) -> Self {
        let supervisor = Supervisor::builder(sink)
            .classifier(LineClassifier::new(config.markers.clone()))
            .stop_timeout(config.stop_timeout())
            .forward_stderr(config.bot.forward_stderr)
            .build();
        let locator = InterpreterLocator::from_config(&config.interpreter);

        Self {
            config,
            locator,
            supervisor,
        }
    }

    /// Replace the interpreter locator.
    #[must_use]
    pub fn with_locator(mut self, locator: InterpreterLocator) -> Self {
        self.locator = locator;
        self
    }

    #[must_use]
    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    #[must_use]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Locate an interpreter without launching anything.
    ///
    /// # Errors
    ///
    /// Returns `LocateError::NotFound` if no candidate works.
    pub async fn locate(&self) -> Result<String, LocateError> {
        self.locator.locate().await
    }

    /// Build the command that runs the bot script with `interpreter`.
    ///
    /// The script path is made absolute so it stays valid once the working
    /// directory changes.
    #[must_use]
    pub fn command(&self, interpreter: &str) -> BotCommand {
        let bot = &self.config.bot;
        let script = absolute(&bot.script);
        let working_dir = bot
            .working_dir
            .clone()
            .or_else(|| script.parent().map(Path::to_path_buf));

        let mut command = BotCommand::new(interpreter)
            .arg(script.to_string_lossy())
            .args(bot.args.iter().cloned())
            .require(&script);
        if let Some(dir) = working_dir {
            command = command.working_dir(dir);
        }
        for (key, value) in &bot.env {
            command = command.env(key, value);
        }
        command
    }

    /// Locate an interpreter and start the bot.
    ///
    /// # Errors
    ///
    /// - `InterpreterNotFound` if no candidate works.
    /// - `Supervisor(..)` for `AlreadyRunning`, `TargetMissing` or `SpawnFailed`.
    pub async fn launch(&self) -> Result<ProcessInfo, LaunchError> {
        if self.supervisor.current_state().is_active() {
            return Err(SupervisorError::AlreadyRunning.into());
        }

        let interpreter = self.locator.locate().await?;
        tracing::info!(interpreter = %interpreter, "Using interpreter: {interpreter}");

        let command = self.command(&interpreter);
        Ok(self.supervisor.start(&command).await?)
    }

    /// Stop the bot on operator request.
    ///
    /// # Errors
    ///
    /// Propagates supervisor errors; stopping an idle bot succeeds.
    pub async fn stop(&self) -> Result<(), LaunchError> {
        Ok(self.supervisor.stop(self.config.stop_timeout()).await?)
    }

    /// Stop the bot because the application is exiting.
    ///
    /// # Errors
    ///
    /// Propagates supervisor errors; exiting with an idle bot succeeds.
    pub async fn exit(&self) -> Result<(), LaunchError> {
        Ok(self
            .supervisor
            .request_exit(self.config.stop_timeout())
            .await?)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

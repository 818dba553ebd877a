//! Interpreter locator.
//!
//! Candidates are probed in order with a version query; the first one that
//! exits successfully within the probe timeout wins. A candidate that cannot
//! be spawned counts as a failed probe and probing moves on.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::config::InterpreterConfig;

/// Default upper bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from interpreter discovery.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LocateError {
    /// Every candidate failed its probe.
    #[error("No working interpreter found (tried: {})", .tried.join(", "))]
    NotFound { tried: Vec<String> },
}

/// Checks whether a candidate interpreter is usable.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, candidate: &str) -> bool;
}

#[async_trait]
impl<P: Probe + ?Sized> Probe for std::sync::Arc<P> {
    async fn probe(&self, candidate: &str) -> bool {
        (**self).probe(candidate).await
    }
}

/// Probes by running `<candidate> <version_arg>` and checking the exit code.
#[derive(Debug, Clone)]
pub struct VersionProbe {
    arg: String,
    timeout: Duration,
}

impl VersionProbe {
    #[must_use]
    pub fn new(arg: impl Into<String>, timeout: Duration) -> Self {
        Self {
            arg: arg.into(),
            timeout,
        }
    }
}

impl Default for VersionProbe {
    fn default() -> Self {
        Self::new("--version", DEFAULT_PROBE_TIMEOUT)
    }
}

#[async_trait]
impl Probe for VersionProbe {
    async fn probe(&self, candidate: &str) -> bool {
        let mut cmd = Command::new(candidate);
        cmd.arg(&self.arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        cmd.creation_flags(0x0800_0000);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(candidate, error = %e, "Probe could not spawn candidate");
                return false;
            }
        };

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(candidate, code = ?status.code(), "Probe finished");
                status.success()
            }
            Ok(Err(e)) => {
                tracing::debug!(candidate, error = %e, "Probe wait failed");
                false
            }
            Err(_) => {
                tracing::debug!(candidate, "Probe timed out");
                if let Err(e) = child.kill().await {
                    tracing::debug!(candidate, error = %e, "Failed to kill timed out probe");
                }
                false
            }
        }
    }
}

/// Finds the first usable interpreter from an ordered candidate list.
pub struct InterpreterLocator {
    candidates: Vec<String>,
    probe: Box<dyn Probe>,
}

impl InterpreterLocator {
    /// Create a locator using [`VersionProbe`] defaults.
    #[must_use]
    pub fn new(candidates: Vec<String>) -> Self {
        Self::with_probe(candidates, VersionProbe::default())
    }

    #[must_use]
    pub fn with_probe(candidates: Vec<String>, probe: impl Probe + 'static) -> Self {
        Self {
            candidates,
            probe: Box::new(probe),
        }
    }

    #[must_use]
    pub fn from_config(config: &InterpreterConfig) -> Self {
        Self::with_probe(
            config.candidates.clone(),
            VersionProbe::new(config.version_arg.clone(), config.probe_timeout()),
        )
    }

    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Return the first candidate whose probe succeeds.
    ///
    /// # Errors
    ///
    /// Returns `LocateError::NotFound` if no candidate succeeds.
    pub async fn locate(&self) -> Result<String, LocateError> {
        for candidate in self.candidates.iter().filter(|c| !c.trim().is_empty()) {
            if self.probe.probe(candidate).await {
                tracing::info!(interpreter = %candidate, "Located interpreter");
                return Ok(candidate.clone());
            }
            tracing::debug!(candidate = %candidate, "Interpreter candidate rejected");
        }

        Err(LocateError::NotFound {
            tried: self.candidates.clone(),
        })
    }
}

//! Configuration types.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::log::Markers;

/// Interpreter discovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Names or paths to try, in order of preference.
    pub candidates: Vec<String>,
    /// Argument passed when probing a candidate.
    pub version_arg: String,
    /// Upper bound on a single probe, in seconds.
    pub probe_timeout_secs: u64,
}

impl InterpreterConfig {
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            candidates: [
                "python",
                "python3",
                r"C:\Python39\python.exe",
                r"C:\Python310\python.exe",
                r"C:\Python311\python.exe",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            version_arg: "--version".to_string(),
            probe_timeout_secs: 5,
        }
    }
}

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Entry script passed to the interpreter. Must exist before launch.
    pub script: PathBuf,
    /// Extra arguments after the script.
    pub args: Vec<String>,
    /// Working directory. Defaults to the script's directory.
    pub working_dir: Option<PathBuf>,
    /// Forward stderr lines to the log view.
    pub forward_stderr: bool,
    /// Extra environment for the bot.
    pub env: BTreeMap<String, String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            script: PathBuf::from("src/main.py"),
            args: Vec::new(),
            working_dir: None,
            forward_stderr: false,
            env: BTreeMap::from([("PYTHONUNBUFFERED".to_string(), "1".to_string())]),
        }
    }
}

/// Top-level launcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Seconds to wait for the bot to exit after killing it.
    pub stop_timeout_secs: u64,
    pub interpreter: InterpreterConfig,
    pub bot: BotConfig,
    pub markers: Markers,
}

impl LauncherConfig {
    #[must_use]
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: 5,
            interpreter: InterpreterConfig::default(),
            bot: BotConfig::default(),
            markers: Markers::default(),
        }
    }
}

//! Classified log lines emitted by the output pump.

use serde::{Deserialize, Serialize};

/// Semantic category of a log line, used downstream for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// A message from a user of the bot.
    User,
    /// An event from an upstream API.
    Api,
    /// An error reported by the bot.
    Error,
    /// Anything else.
    Plain,
}

impl Category {
    /// Short uppercase label for display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Api => "API",
            Self::Error => "ERROR",
            Self::Plain => "LOG",
        }
    }
}

/// Which output stream of the child a line came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamSource {
    #[default]
    Stdout,
    Stderr,
}

/// A single non-blank line of child output.
///
/// Immutable once created: fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    seq: u64,
    text: String,
    category: Category,
    source: StreamSource,
}

impl LogLine {
    #[must_use]
    pub fn new(seq: u64, text: impl Into<String>, category: Category, source: StreamSource) -> Self {
        Self {
            seq,
            text: text.into(),
            category,
            source,
        }
    }

    /// Monotonic sequence number, unique per supervisor.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Raw line text without the trailing newline.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }

    #[must_use]
    pub fn source(&self) -> StreamSource {
        self.source
    }
}

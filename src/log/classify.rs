//! Marker-based line classification.
//!
//! Rules are checked in a fixed priority order (user, API, error) and the
//! first match wins, so a line carrying several markers gets exactly one
//! category.

use serde::{Deserialize, Serialize};

use super::Category;

/// Marker tokens searched for in each line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Token marking a user message.
    pub user: String,
    /// Token marking an API event.
    pub api: String,
    /// Token marking an error.
    pub error: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            user: "[USER]".to_string(),
            api: "[API]".to_string(),
            error: "[ERROR]".to_string(),
        }
    }
}

/// Maps raw lines to a [`Category`].
#[derive(Debug, Clone, Default)]
pub struct LineClassifier {
    markers: Markers,
}

impl LineClassifier {
    #[must_use]
    pub fn new(markers: Markers) -> Self {
        Self { markers }
    }

    #[must_use]
    pub fn markers(&self) -> &Markers {
        &self.markers
    }

    /// Classify a line. Total: every input yields exactly one category.
    ///
    /// An empty marker never matches.
    #[must_use]
    pub fn classify(&self, line: &str) -> Category {
        let rules = [
            (&self.markers.user, Category::User),
            (&self.markers.api, Category::Api),
            (&self.markers.error, Category::Error),
        ];

        rules
            .into_iter()
            .find(|(marker, _)| !marker.is_empty() && line.contains(marker.as_str()))
            .map_or(Category::Plain, |(_, category)| category)
    }

    /// Whether a line is dropped before classification.
    #[must_use]
    pub fn is_blank(line: &str) -> bool {
        line.trim().is_empty()
    }
}

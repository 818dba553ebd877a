//! Console presentation sinks for the launcher binary.
//!
//! [`ConsoleSink`] colors lines by category the way the desktop log view
//! does; [`JsonSink`] writes one JSON object per event.

use std::io::{self, Write};

use chrono::Local;
use owo_colors::OwoColorize;

use crate::log::{Category, LogLine};
use crate::supervisor::{EventSink, LifecycleState, SupervisorEvent};

/// Get current timestamp for status lines.
fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Render a log line with its category color, without a trailing newline.
#[must_use]
pub fn format_line(line: &LogLine) -> String {
    let text = line.text();
    match line.category() {
        Category::User => text.truecolor(0, 255, 255).to_string(),
        Category::Api => text.truecolor(255, 165, 0).to_string(),
        Category::Error => text.truecolor(255, 80, 80).to_string(),
        Category::Plain => text.truecolor(238, 238, 238).to_string(),
    }
}

/// Render a status line for a lifecycle state.
#[must_use]
pub fn format_status(state: &LifecycleState) -> String {
    let label = format!("Status: {state}");
    let label = match state {
        LifecycleState::Running => label.truecolor(76, 175, 80).bold().to_string(),
        LifecycleState::Stopped | LifecycleState::Failed(_) => {
            label.truecolor(244, 67, 54).bold().to_string()
        }
        _ => label.dimmed().to_string(),
    };
    format!("{} {label}", timestamp().dimmed())
}

/// Prints colored lines to stdout and status changes to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn on_line(&self, line: &LogLine) {
        let mut out = io::stdout().lock();
        let _ = writeln!(out, "{}", format_line(line));
        let _ = out.flush();
    }

    fn on_state(&self, state: &LifecycleState) {
        let mut err = io::stderr().lock();
        let _ = writeln!(err, "{}", format_status(state));
        if matches!(state, LifecycleState::Stopped) {
            let _ = writeln!(err, "Bot stopped.");
        }
    }
}

/// Prints every event as a JSON line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSink;

impl JsonSink {
    fn write(event: &SupervisorEvent) {
        match serde_json::to_string(event) {
            Ok(json) => {
                let mut out = io::stdout().lock();
                let _ = writeln!(out, "{json}");
                let _ = out.flush();
            }
            Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
        }
    }
}

impl EventSink for JsonSink {
    fn on_line(&self, line: &LogLine) {
        Self::write(&SupervisorEvent::Line(line.clone()));
    }

    fn on_state(&self, state: &LifecycleState) {
        Self::write(&SupervisorEvent::State(state.clone()));
    }
}

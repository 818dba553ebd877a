//! Event sink interface consumed by the presentation layer.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::log::{Category, LogLine};

use super::LifecycleState;

/// Receives classified lines and state transitions.
///
/// Called on whatever task produced the event. Implementations must return
/// quickly; moving work onto another context is up to the implementation.
pub trait EventSink: Send + Sync {
    fn on_line(&self, line: &LogLine);
    fn on_state(&self, state: &LifecycleState);
}

/// An event observed by a sink, as one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SupervisorEvent {
    State(LifecycleState),
    Line(LogLine),
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SupervisorEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver draining it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SupervisorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_line(&self, line: &LogLine) {
        // Receiver gone means nobody is watching anymore.
        let _ = self.tx.send(SupervisorEvent::Line(line.clone()));
    }

    fn on_state(&self, state: &LifecycleState) {
        let _ = self.tx.send(SupervisorEvent::State(state.clone()));
    }
}

/// Writes events to `tracing` under the `bot` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn on_line(&self, line: &LogLine) {
        match line.category() {
            Category::Error => {
                tracing::warn!(target: "bot", seq = line.seq(), "{}", line.text());
            }
            category => {
                tracing::info!(
                    target: "bot",
                    seq = line.seq(),
                    category = category.label(),
                    "{}",
                    line.text()
                );
            }
        }
    }

    fn on_state(&self, state: &LifecycleState) {
        tracing::info!(target: "bot", %state, "Bot status changed");
    }
}

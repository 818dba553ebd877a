//! Lifecycle state machine.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use super::EventSink;

/// Lifecycle state of the supervised process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed(String),
}

impl LifecycleState {
    /// Whether the move from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: &LifecycleState) -> bool {
        use LifecycleState::{Failed, Idle, Running, Starting, Stopped, Stopping};

        matches!(
            (self, next),
            (Idle | Stopped | Failed(_), Starting)
                | (Starting, Running | Failed(_))
                | (Running, Stopping | Failed(_))
                | (Stopping, Stopped)
        )
    }

    /// No process is live and none is on its way up or down.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped | Self::Failed(_))
    }

    /// A process is live or being spawned.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("Idle"),
            Self::Starting => f.write_str("Starting"),
            Self::Running => f.write_str("Running"),
            Self::Stopping => f.write_str("Stopping"),
            Self::Stopped => f.write_str("Stopped"),
            Self::Failed(reason) => write!(f, "Failed: {reason}"),
        }
    }
}

/// Holds the current state and publishes every transition.
///
/// Transitions are applied and delivered to the sink under one lock, so
/// observers see them in the order they happened.
pub(crate) struct StateCell {
    tx: watch::Sender<LifecycleState>,
    sink: Arc<dyn EventSink>,
    order: Mutex<()>,
}

impl StateCell {
    pub(crate) fn new(sink: Arc<dyn EventSink>) -> Self {
        let (tx, _) = watch::channel(LifecycleState::Idle);
        Self {
            tx,
            sink,
            order: Mutex::new(()),
        }
    }

    pub(crate) fn current(&self) -> LifecycleState {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.tx.subscribe()
    }

    /// Apply a transition. Illegal transitions are logged and ignored.
    pub(crate) fn transition(&self, next: LifecycleState) -> bool {
        let _order = self.order.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.current();
        if !current.can_transition_to(&next) {
            tracing::warn!(from = %current, to = %next, "Ignoring illegal state transition");
            return false;
        }

        tracing::debug!(from = %current, to = %next, "State transition");
        self.tx.send_replace(next.clone());
        self.sink.on_state(&next);
        true
    }

    /// Resolve once the state satisfies `pred`.
    pub(crate) async fn wait_for(&self, pred: impl FnMut(&LifecycleState) -> bool) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(pred).await;
    }
}

//! Cancellation signal and shutdown triggers.

use std::fmt;

use tokio_util::sync::CancellationToken;

/// Single-shot cancellation shared between the supervisor and its pumps.
///
/// Once fired it stays fired; firing again has no further effect.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    token: CancellationToken,
}

impl CancellationSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the signal has been fired.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}

/// What asked the supervised process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTrigger {
    /// An explicit stop request from the operator.
    UserRequest,
    /// The owning application is exiting.
    AppExit,
    /// The process closed its output on its own.
    ProcessExited,
}

impl fmt::Display for StopTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UserRequest => "user request",
            Self::AppExit => "application exit",
            Self::ProcessExited => "process exited",
        })
    }
}

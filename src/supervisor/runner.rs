//! Supervisor owning the bot process and its lifecycle.
//!
//! Start and stop run under one async lock, so at most one process is live
//! per supervisor and a start issued during a stop waits for it. Every
//! shutdown trigger goes through the same stop routine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::log::{LineClassifier, StreamSource};
use crate::process::{BotCommand, OutputPump, ProcessHandle, ProcessInfo, PumpExit, PumpReport};
use crate::supervisor::{
    CancellationSignal, EventSink, LifecycleState, StateCell, StopTrigger, SupervisorError,
};

/// Default time to wait for the process to exit after killing it.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a pump gets to drain after its process has exited.
const PUMP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A live process and the tasks draining it.
struct ActiveRun {
    id: u64,
    process: ProcessHandle,
    cancel: CancellationSignal,
    stdout_pump: JoinHandle<PumpReport>,
    stderr_pump: Option<JoinHandle<PumpReport>>,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveRun>,
}

struct Shared {
    state: StateCell,
    sink: Arc<dyn EventSink>,
    classifier: Arc<LineClassifier>,
    seq: Arc<AtomicU64>,
    runs: AtomicU64,
    stop_timeout: Duration,
    forward_stderr: bool,
    slot: tokio::sync::Mutex<Slot>,
    last_process: Mutex<Option<ProcessInfo>>,
}

impl Shared {
    fn record_process(&self, info: ProcessInfo) {
        *self
            .last_process
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(info);
    }
}

/// Builder for [`Supervisor`].
pub struct SupervisorBuilder {
    sink: Arc<dyn EventSink>,
    classifier: LineClassifier,
    stop_timeout: Duration,
    forward_stderr: bool,
}

impl SupervisorBuilder {
    #[must_use]
    pub fn classifier(mut self, classifier: LineClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Timeout used when the process exits on its own.
    #[must_use]
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Forward stderr lines to the sink instead of only tracing them.
    #[must_use]
    pub fn forward_stderr(mut self, forward: bool) -> Self {
        self.forward_stderr = forward;
        self
    }

    #[must_use]
    pub fn build(self) -> Supervisor {
        let shared = Shared {
            state: StateCell::new(self.sink.clone()),
            sink: self.sink,
            classifier: Arc::new(self.classifier),
            seq: Arc::new(AtomicU64::new(0)),
            runs: AtomicU64::new(0),
            stop_timeout: self.stop_timeout,
            forward_stderr: self.forward_stderr,
            slot: tokio::sync::Mutex::new(Slot::default()),
            last_process: Mutex::new(None),
        };
        Supervisor {
            shared: Arc::new(shared),
        }
    }
}

/// Supervises a single bot process.
///
/// Cloning is cheap; clones control the same process.
#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

impl Supervisor {
    /// Create a supervisor with default settings.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self::builder(sink).build()
    }

    #[must_use]
    pub fn builder(sink: Arc<dyn EventSink>) -> SupervisorBuilder {
        SupervisorBuilder {
            sink,
            classifier: LineClassifier::default(),
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            forward_stderr: false,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn current_state(&self) -> LifecycleState {
        self.shared.state.current()
    }

    /// Watch lifecycle state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.shared.state.subscribe()
    }

    /// Resolve once no process is live or shutting down.
    pub async fn wait_until_stopped(&self) -> LifecycleState {
        self.shared.state.wait_for(LifecycleState::is_settled).await;
        self.current_state()
    }

    /// The most recently started process, with its exit code once reaped.
    #[must_use]
    pub fn process_info(&self) -> Option<ProcessInfo> {
        *self
            .shared
            .last_process
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawn the bot and start pumping its output.
    ///
    /// If a previous stop is still reaping its process, this waits for it
    /// to reach `Stopped` first.
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if a process is starting or running.
    /// - `TargetMissing` if a required file is absent; nothing is spawned.
    /// - `SpawnFailed` if the OS spawn fails; the state becomes `Failed`.
    pub async fn start(&self, command: &BotCommand) -> Result<ProcessInfo, SupervisorError> {
        let mut slot = self.shared.slot.lock().await;
        self.shared
            .state
            .wait_for(|state| !matches!(state, LifecycleState::Stopping))
            .await;

        if slot.active.is_some() || self.current_state().is_active() {
            tracing::warn!("Start rejected, bot is already running");
            return Err(SupervisorError::AlreadyRunning);
        }

        if let Some(path) = command.missing_requirement() {
            tracing::error!(path = %path.display(), "Required file missing, not starting");
            return Err(SupervisorError::TargetMissing(path.to_path_buf()));
        }

        self.shared.state.transition(LifecycleState::Starting);

        let mut process = match ProcessHandle::spawn(command) {
            Ok(process) => process,
            Err(source) => {
                tracing::error!(program = %command.program(), error = %source, "Spawn failed");
                self.shared
                    .state
                    .transition(LifecycleState::Failed(source.to_string()));
                return Err(SupervisorError::SpawnFailed {
                    program: command.program().to_string(),
                    source,
                });
            }
        };

        let Some(stdout) = process.take_stdout() else {
            // Dropping the handle kills the child.
            self.shared.state.transition(LifecycleState::Failed(
                SupervisorError::NoStdout.to_string(),
            ));
            return Err(SupervisorError::NoStdout);
        };
        let stderr = process.take_stderr();

        let run_id = self.shared.runs.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationSignal::new();
        let info = process.info();
        self.shared.record_process(info);

        // Running is published before the pumps exist so it precedes every line.
        self.shared.state.transition(LifecycleState::Running);

        let stdout_pump = self.spawn_stdout_pump(stdout, cancel.clone(), run_id);
        let stderr_pump = stderr.map(|stderr| self.spawn_stderr_pump(stderr, cancel.clone()));

        tracing::info!(
            program = %command.program(),
            pid = ?info.pid,
            run = run_id,
            "Bot started"
        );

        slot.active = Some(ActiveRun {
            id: run_id,
            process,
            cancel,
            stdout_pump,
            stderr_pump,
        });
        Ok(info)
    }

    fn spawn_stdout_pump(
        &self,
        stdout: tokio::process::ChildStdout,
        cancel: CancellationSignal,
        run_id: u64,
    ) -> JoinHandle<PumpReport> {
        let pump = OutputPump::new(
            stdout,
            self.shared.classifier.clone(),
            self.shared.sink.clone(),
            cancel,
        )
        .with_sequence(self.shared.seq.clone());
        let shared: Weak<Shared> = Arc::downgrade(&self.shared);

        tokio::spawn(async move {
            let report = pump.run().await;
            if report.exit.is_stream_end() {
                if let Some(shared) = shared.upgrade() {
                    let supervisor = Supervisor { shared };
                    // Detached: the stop routine joins this task.
                    tokio::spawn(async move {
                        let timeout = supervisor.shared.stop_timeout;
                        supervisor
                            .shutdown_run(StopTrigger::ProcessExited, timeout, Some(run_id))
                            .await;
                    });
                }
            }
            report
        })
    }

    fn spawn_stderr_pump(
        &self,
        stderr: tokio::process::ChildStderr,
        cancel: CancellationSignal,
    ) -> JoinHandle<PumpReport> {
        let sink: Arc<dyn EventSink> = if self.shared.forward_stderr {
            self.shared.sink.clone()
        } else {
            Arc::new(StderrTrace)
        };
        let pump = OutputPump::new(stderr, self.shared.classifier.clone(), sink, cancel)
            .with_sequence(self.shared.seq.clone())
            .with_source(StreamSource::Stderr);
        tokio::spawn(pump.run())
    }

    /// Stop the bot on operator request.
    ///
    /// # Errors
    ///
    /// Currently infallible; stopping an idle supervisor is a no-op.
    pub async fn stop(&self, timeout: Duration) -> Result<(), SupervisorError> {
        self.shutdown(StopTrigger::UserRequest, timeout).await
    }

    /// Stop the bot because the owning application is exiting.
    ///
    /// # Errors
    ///
    /// Currently infallible; stopping an idle supervisor is a no-op.
    pub async fn request_exit(&self, timeout: Duration) -> Result<(), SupervisorError> {
        self.shutdown(StopTrigger::AppExit, timeout).await
    }

    /// Stop the bot for any trigger. Idempotent.
    ///
    /// Fires cancellation, kills the process and waits up to `timeout` for it
    /// to exit. If the wait times out this still returns `Ok`; reaping
    /// continues in the background and `Stopped` is published once the OS
    /// confirms the exit.
    ///
    /// After a spontaneous exit the kill is skipped and cancellation fires
    /// once the remaining output has drained.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` keeps the signature uniform with `start`.
    pub async fn shutdown(
        &self,
        trigger: StopTrigger,
        timeout: Duration,
    ) -> Result<(), SupervisorError> {
        self.shutdown_run(trigger, timeout, None).await;
        Ok(())
    }

    /// Shared stop routine. With `only_run` set, acts only on that run.
    async fn shutdown_run(&self, trigger: StopTrigger, timeout: Duration, only_run: Option<u64>) {
        let mut slot = self.shared.slot.lock().await;

        let run = match slot.active.take() {
            Some(run) if only_run.is_some_and(|id| id != run.id) => {
                slot.active = Some(run);
                tracing::debug!(%trigger, "Ignoring stop trigger from an earlier run");
                return;
            }
            Some(run) => run,
            None => {
                tracing::debug!(%trigger, "Stop requested with no running bot");
                return;
            }
        };

        tracing::info!(%trigger, run = run.id, pid = ?run.process.id(), "Stopping bot");
        self.shared.state.transition(LifecycleState::Stopping);

        let ActiveRun {
            mut process,
            cancel,
            stdout_pump,
            stderr_pump,
            ..
        } = run;
        let pumps = Pumps {
            cancel,
            stdout: stdout_pump,
            stderr: stderr_pump,
        };

        // After a spontaneous exit stderr is left to drain on its own.
        if trigger != StopTrigger::ProcessExited {
            pumps.cancel.fire();
        }

        match process.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => {
                if let Err(e) = process.start_kill() {
                    tracing::warn!(error = %e, "Failed to kill bot process");
                }
            }
        }

        match process.wait_timeout(timeout).await {
            Ok(Some(status)) => {
                tracing::info!(code = ?status.code(), "Bot process exited");
                finish(&self.shared, &process, pumps).await;
            }
            Ok(None) => {
                tracing::warn!(
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "Bot did not exit before timeout, reaping in background"
                );
                let shared = self.shared.clone();
                tokio::spawn(async move {
                    if let Err(e) = process.wait().await {
                        tracing::warn!(error = %e, "Failed to reap bot process");
                    }
                    finish(&shared, &process, pumps).await;
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to wait for bot process");
                finish(&self.shared, &process, pumps).await;
            }
        }
    }
}

/// Pump tasks of a run being stopped.
struct Pumps {
    cancel: CancellationSignal,
    stdout: JoinHandle<PumpReport>,
    stderr: Option<JoinHandle<PumpReport>>,
}

/// Join the pumps, record the exit and publish `Stopped`.
///
/// A pump still reading after [`PUMP_JOIN_TIMEOUT`] is cancelled, and
/// detached if it does not finish within a second period.
async fn finish(shared: &Shared, process: &ProcessHandle, pumps: Pumps) {
    let Pumps {
        cancel,
        stdout,
        stderr,
    } = pumps;

    for mut pump in std::iter::once(stdout).chain(stderr) {
        let joined = match tokio::time::timeout(PUMP_JOIN_TIMEOUT, &mut pump).await {
            Ok(joined) => Some(joined),
            Err(_) => {
                cancel.fire();
                tokio::time::timeout(PUMP_JOIN_TIMEOUT, &mut pump).await.ok()
            }
        };
        match joined {
            Some(Ok(report)) => {
                if let PumpExit::ReadError(e) = &report.exit {
                    tracing::debug!(error = %e, "Pump ended on read error");
                }
            }
            Some(Err(e)) => tracing::warn!(error = %e, "Pump task failed"),
            None => tracing::warn!("Pump did not finish in time, detaching"),
        }
    }
    cancel.fire();

    shared.record_process(process.info());
    shared.state.transition(LifecycleState::Stopped);
}

/// Sink for stderr lines that are not forwarded.
struct StderrTrace;

impl EventSink for StderrTrace {
    fn on_line(&self, line: &crate::log::LogLine) {
        tracing::debug!(target: "bot::stderr", "{}", line.text());
    }

    fn on_state(&self, _state: &LifecycleState) {}
}

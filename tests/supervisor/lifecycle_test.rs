//! End-to-end lifecycle tests against real child processes.

use std::sync::Arc;

use lucia_launcher::log::{Category, StreamSource};
use lucia_launcher::supervisor::{
    ChannelSink, LifecycleState, Supervisor, SupervisorError, SupervisorEvent,
};

use super::{events_until_settled, sh, states};

#[cfg(unix)]
#[tokio::test]
async fn run_to_completion_classifies_output() {
    let (sink, mut rx) = ChannelSink::new();
    let supervisor = Supervisor::new(Arc::new(sink));

    let info = supervisor
        .start(&sh("printf '[USER] hello\\n\\n[ERROR] bad\\n'"))
        .await
        .unwrap();
    assert!(info.running);
    assert!(info.pid.is_some());

    let events = events_until_settled(&mut rx).await;

    assert_eq!(
        states(&events),
        [
            LifecycleState::Starting,
            LifecycleState::Running,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ]
    );

    let lines: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Line(line) => Some(line),
            SupervisorEvent::State(_) => None,
        })
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].text(), "[USER] hello");
    assert_eq!(lines[0].category(), Category::User);
    assert_eq!(lines[0].seq(), 0);
    assert_eq!(lines[1].text(), "[ERROR] bad");
    assert_eq!(lines[1].category(), Category::Error);
    assert_eq!(lines[1].seq(), 1);

    // Running precedes every line and Stopping follows every line.
    let running = events
        .iter()
        .position(|e| *e == SupervisorEvent::State(LifecycleState::Running))
        .unwrap();
    let stopping = events
        .iter()
        .position(|e| *e == SupervisorEvent::State(LifecycleState::Stopping))
        .unwrap();
    assert_eq!(running, 1);
    assert_eq!(stopping, 4);

    let info = supervisor.process_info().unwrap();
    assert!(!info.running);
    assert_eq!(info.exit_code, Some(0));
    assert_eq!(supervisor.current_state(), LifecycleState::Stopped);
}

#[cfg(unix)]
#[tokio::test]
async fn exit_code_is_recorded() {
    let (sink, mut rx) = ChannelSink::new();
    let supervisor = Supervisor::new(Arc::new(sink));

    supervisor.start(&sh("exit 7")).await.unwrap();
    events_until_settled(&mut rx).await;

    // A non-zero exit is still a normal stop.
    assert_eq!(supervisor.current_state(), LifecycleState::Stopped);
    assert_eq!(supervisor.process_info().unwrap().exit_code, Some(7));
}

#[cfg(unix)]
#[tokio::test]
async fn second_start_is_rejected_while_running() {
    let (sink, mut rx) = ChannelSink::new();
    let supervisor = Supervisor::new(Arc::new(sink));

    let first = supervisor.start(&sh("exec sleep 30")).await.unwrap();

    let err = supervisor.start(&sh("echo second")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::AlreadyRunning));
    assert_eq!(supervisor.current_state(), LifecycleState::Running);
    assert_eq!(supervisor.process_info().unwrap().pid, first.pid);

    supervisor
        .stop(std::time::Duration::from_secs(5))
        .await
        .unwrap();
    let events = events_until_settled(&mut rx).await;
    assert_eq!(
        states(&events),
        [
            LifecycleState::Starting,
            LifecycleState::Running,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn restart_continues_sequence_numbers() {
    let (sink, mut rx) = ChannelSink::new();
    let supervisor = Supervisor::new(Arc::new(sink));

    supervisor.start(&sh("printf 'a\\nb\\n'")).await.unwrap();
    events_until_settled(&mut rx).await;

    supervisor.start(&sh("echo c")).await.unwrap();
    let events = events_until_settled(&mut rx).await;

    let seqs: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Line(line) => Some((line.seq(), line.text().to_string())),
            SupervisorEvent::State(_) => None,
        })
        .collect();
    assert_eq!(seqs, [(2, "c".to_string())]);
    assert_eq!(states(&events)[0], LifecycleState::Starting);
}

#[cfg(unix)]
#[tokio::test]
async fn restart_after_spawn_failure() {
    let (sink, mut rx) = ChannelSink::new();
    let supervisor = Supervisor::new(Arc::new(sink));

    let err = supervisor
        .start(&lucia_launcher::process::BotCommand::new(
            "no-such-bot-interpreter-71b0",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, SupervisorError::SpawnFailed { .. }));
    let events = events_until_settled(&mut rx).await;
    assert!(matches!(
        states(&events)[..],
        [LifecycleState::Starting, LifecycleState::Failed(_)]
    ));

    supervisor.start(&sh("echo back")).await.unwrap();
    let events = events_until_settled(&mut rx).await;
    assert_eq!(
        states(&events),
        [
            LifecycleState::Starting,
            LifecycleState::Running,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn stderr_is_drained_but_not_forwarded_by_default() {
    let (sink, mut rx) = ChannelSink::new();
    let supervisor = Supervisor::new(Arc::new(sink));

    supervisor
        .start(&sh("echo '[ERROR] on stderr' >&2; echo '[API] on stdout'"))
        .await
        .unwrap();
    let events = events_until_settled(&mut rx).await;

    let lines: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            SupervisorEvent::Line(line) => Some(line.text().to_string()),
            SupervisorEvent::State(_) => None,
        })
        .collect();
    assert_eq!(lines, ["[API] on stdout"]);
}

#[cfg(unix)]
#[tokio::test]
async fn stderr_is_forwarded_when_enabled() {
    let (sink, mut rx) = ChannelSink::new();
    let supervisor = Supervisor::builder(Arc::new(sink))
        .forward_stderr(true)
        .build();

    supervisor
        .start(&sh("echo '[ERROR] boom' >&2"))
        .await
        .unwrap();
    let events = events_until_settled(&mut rx).await;

    let line = events
        .iter()
        .find_map(|event| match event {
            SupervisorEvent::Line(line) => Some(line),
            SupervisorEvent::State(_) => None,
        })
        .expect("stderr line delivered before Stopped");
    assert_eq!(line.text(), "[ERROR] boom");
    assert_eq!(line.category(), Category::Error);
    assert_eq!(line.source(), StreamSource::Stderr);
}

#[cfg(unix)]
#[tokio::test]
async fn watch_subscription_sees_final_state() {
    let (sink, _rx) = ChannelSink::new();
    let supervisor = Supervisor::new(Arc::new(sink));
    let watch = supervisor.subscribe();
    assert_eq!(*watch.borrow(), LifecycleState::Idle);

    supervisor.start(&sh("true")).await.unwrap();
    let state = supervisor.wait_until_stopped().await;
    assert_eq!(state, LifecycleState::Stopped);
    assert_eq!(*watch.borrow(), LifecycleState::Stopped);
}

//! Session broker tests

use std::time::{Duration, Instant};

use nix::sys::signal::kill;
use nix::unistd::Pid;
use ocd_api_models::models::{OutputEvent, ProgressStatus, Stage};
use ocd_gui::deploy::runner::{ABORTED_MESSAGE, SUCCESS_MESSAGE};
use ocd_gui::deploy::{CancelAck, Outcome, SessionBroker, SessionStatus};
use ocd_gui::errors::OcdError;

use crate::common::{collect, git_tree, outputs, path_of, runner, wait_finished, EVENT_DEADLINE};

fn broker(script: &str) -> SessionBroker {
    SessionBroker::new(runner(script, Duration::from_secs(30)))
}

/// Alive and not a zombie
fn is_running(pid: i32) -> bool {
    if kill(Pid::from_raw(pid), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

#[tokio::test]
async fn test_missing_target_yields_single_failure() {
    let broker = broker("echo should-not-run\n");
    let session = broker.start("/definitely/not/a/real/folder").await;

    let events = collect(&session).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], OutputEvent::Complete { success: false, .. }));
    assert_eq!(session.status(), SessionStatus::Finished(Outcome::Failure));
}

#[tokio::test]
async fn test_build_marker_reports_service_progress() {
    let dir = git_tree();
    let broker = broker("echo 'Building microservice: foo'\nexit 0\n");
    let session = broker.start(&path_of(&dir)).await;

    let events = collect(&session).await;
    let progress = events
        .iter()
        .position(|e| {
            matches!(
                e,
                OutputEvent::Progress(p) if p.stage == Stage::Build
                    && p.status == ProgressStatus::Running
                    && p.service.as_deref() == Some("foo")
            )
        })
        .expect("no build progress");
    let complete = events.iter().position(|e| e.is_terminal()).unwrap();
    assert!(progress < complete);
    assert_eq!(complete, events.len() - 1);
    assert_eq!(events[complete], OutputEvent::complete(true, SUCCESS_MESSAGE));

    wait_finished(&session).await;
    assert_eq!(session.status(), SessionStatus::Finished(Outcome::Success));
}

#[tokio::test]
async fn test_output_order_is_preserved() {
    let dir = git_tree();
    let broker = broker("echo A\necho B\necho C\n");
    let session = broker.start(&path_of(&dir)).await;

    let events = collect(&session).await;
    let lines: Vec<_> = outputs(&events)
        .into_iter()
        .filter(|l| ["A", "B", "C"].contains(l))
        .collect();
    assert_eq!(lines, vec!["A", "B", "C"]);
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_timeout_kills_deployment() {
    let dir = git_tree();
    let broker = SessionBroker::new(runner(
        "sleep 30 &\necho $! > sleeper.pid\necho started\nwait\n",
        Duration::from_secs(1),
    ));
    let started = Instant::now();
    let session = broker.start(&path_of(&dir)).await;

    let events = collect(&session).await;
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(
        events.last(),
        Some(&OutputEvent::complete(false, "Deployment timed out after 1 seconds"))
    );

    let pid: i32 = std::fs::read_to_string(dir.path().join("sleeper.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(5);
    while is_running(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!is_running(pid), "background process {} survived the timeout", pid);

    wait_finished(&session).await;
    assert_eq!(session.status(), SessionStatus::Finished(Outcome::Timeout));
}

#[tokio::test]
async fn test_cancel_mid_run_aborts_quickly() {
    let dir = git_tree();
    let broker = broker("echo started\nsleep 30\necho never\n");
    let session = broker.start(&path_of(&dir)).await;
    let mut events = session.take_events().unwrap();

    let first = tokio::time::timeout(EVENT_DEADLINE, events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, OutputEvent::output("started"));

    let cancelled_at = Instant::now();
    assert_eq!(broker.cancel(session.id()).await.unwrap(), CancelAck::Cancelled);
    assert_eq!(
        broker.cancel(session.id()).await.unwrap(),
        CancelAck::AlreadyCancelled
    );

    let mut rest = Vec::new();
    while let Some(event) = tokio::time::timeout(EVENT_DEADLINE, events.recv()).await.unwrap() {
        rest.push(event);
    }
    assert!(cancelled_at.elapsed() < Duration::from_secs(5));
    assert!(!outputs(&rest).contains(&"never"));
    assert_eq!(rest.last(), Some(&OutputEvent::complete(false, ABORTED_MESSAGE)));

    wait_finished(&session).await;
    assert_eq!(session.status(), SessionStatus::Finished(Outcome::Aborted));
    assert_eq!(
        broker.cancel(session.id()).await.unwrap(),
        CancelAck::AlreadyFinished
    );
}

#[tokio::test]
async fn test_cancel_unknown_session() {
    let broker = broker("true\n");
    assert!(matches!(
        broker.cancel("deploy_missing").await,
        Err(OcdError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_events_are_taken_once() {
    let broker = broker("true\n");
    let session = broker.start("").await;
    assert!(session.take_events().is_some());
    assert!(session.take_events().is_none());
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let first_dir = git_tree();
    let second_dir = git_tree();
    let broker = broker("pwd\n");

    let first = broker.start(&path_of(&first_dir)).await;
    let second = broker.start(&path_of(&second_dir)).await;
    assert_ne!(first.id(), second.id());
    assert_eq!(broker.len().await, 2);

    let (first_events, second_events) = tokio::join!(collect(&first), collect(&second));
    let first_cwd = std::fs::canonicalize(first_dir.path()).unwrap();
    let second_cwd = std::fs::canonicalize(second_dir.path()).unwrap();
    assert!(outputs(&first_events).contains(&first_cwd.to_str().unwrap()));
    assert!(outputs(&second_events).contains(&second_cwd.to_str().unwrap()));
    assert!(!outputs(&first_events).contains(&second_cwd.to_str().unwrap()));
}

#[tokio::test]
async fn test_evict_finished_keeps_running_sessions() {
    let dir = git_tree();
    let broker = broker("sleep 30\n");

    let running = broker.start(&path_of(&dir)).await;
    let rejected = broker.start("/no/such/folder").await;
    assert!(rejected.is_finished());

    assert_eq!(broker.evict_finished(Duration::ZERO).await, 1);
    assert!(broker.get(rejected.id()).await.is_none());
    assert!(broker.get(running.id()).await.is_some());
    assert_eq!(broker.active_count().await, 1);

    broker.cancel_all().await;
    wait_finished(&running).await;
    assert_eq!(broker.active_count().await, 0);
}

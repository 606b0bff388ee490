//! Shared fixtures

use std::sync::Arc;
use std::time::Duration;

use ocd_api_models::models::OutputEvent;
use ocd_gui::app::state::AppState;
use ocd_gui::deploy::{Platform, ProcessRunner, RunnerOptions, ScriptBundle, Session};
use ocd_gui::server::origin::OriginPolicy;
use ocd_gui::server::state::ServerState;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

/// Upper bound for any single deployment in these tests
pub const EVENT_DEADLINE: Duration = Duration::from_secs(20);

pub fn runner(script: &str, timeout: Duration) -> ProcessRunner {
    ProcessRunner::new(
        Platform::Direct,
        ScriptBundle::with_main(script),
        RunnerOptions {
            timeout,
            drain_grace: Duration::from_secs(2),
        },
    )
}

pub fn app_state(script: &str) -> AppState {
    AppState::with_runner(runner(script, Duration::from_secs(30)))
}

pub fn server_state(app: &AppState) -> Arc<ServerState> {
    Arc::new(ServerState::new(
        app,
        OriginPolicy::new(&["localhost".to_string(), "127.0.0.1".to_string()]),
    ))
}

/// Directory that passes target validation
pub fn git_tree() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    dir
}

pub fn path_of(dir: &TempDir) -> String {
    dir.path().to_str().unwrap().to_string()
}

/// Read a session stream to its end
pub async fn drain(mut events: UnboundedReceiver<OutputEvent>) -> Vec<OutputEvent> {
    tokio::time::timeout(EVENT_DEADLINE, async move {
        let mut all = Vec::new();
        while let Some(event) = events.recv().await {
            all.push(event);
        }
        all
    })
    .await
    .expect("deployment did not finish in time")
}

pub async fn collect(session: &Session) -> Vec<OutputEvent> {
    drain(session.take_events().unwrap()).await
}

pub fn outputs(events: &[OutputEvent]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|e| match e {
            OutputEvent::Output { content } => Some(content.as_str()),
            _ => None,
        })
        .collect()
}

/// The session is marked finished right after its terminal event is sent
pub async fn wait_finished(session: &Session) {
    tokio::time::timeout(EVENT_DEADLINE, async {
        while !session.is_finished() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("session never finished");
}

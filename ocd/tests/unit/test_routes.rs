//! HTTP route tests

use std::process::Command;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use futures::StreamExt;
use ocd_api_models::models::{
    CancelResponse, ChangesResponse, DeployStartResponse, ErrorResponse, HealthResponse, PublicConfigResponse,
    TargetResponse,
};
use ocd_gui::deploy::runner::ABORTED_MESSAGE;
use ocd_gui::server::serve::router;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::common::{app_state, git_tree, path_of, server_state, EVENT_DEADLINE};

fn app(script: &str) -> Router {
    router(server_state(&app_state(script)))
}

async fn body_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Incremental reader of `data:` frames from an SSE response
struct SseFrames {
    body: axum::body::BodyDataStream,
    buffer: String,
}

impl SseFrames {
    fn new(response: axum::response::Response) -> Self {
        Self {
            body: response.into_body().into_data_stream(),
            buffer: String::new(),
        }
    }

    async fn next_frame(&mut self) -> Option<Value> {
        tokio::time::timeout(EVENT_DEADLINE, async {
            loop {
                while let Some(end) = self.buffer.find("\n\n") {
                    let frame: String = self.buffer.drain(..end + 2).collect();
                    if let Some(data) = frame
                        .lines()
                        .find_map(|l| l.strip_prefix("data:").map(str::trim_start))
                    {
                        return Some(serde_json::from_str(data).unwrap());
                    }
                }
                let chunk = self.body.next().await?;
                self.buffer.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            }
        })
        .await
        .expect("no SSE frame in time")
    }
}

#[tokio::test]
async fn test_health() {
    let response = app("true\n").oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let health: HealthResponse = body_json(response).await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.service, "ocd-gui");
    assert_eq!(health.active_sessions, 0);
}

#[tokio::test]
async fn test_public_config_hides_unset_integrations() {
    let response = app("true\n")
        .oneshot(get("/api/config/public"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let config: PublicConfigResponse = body_json(response).await;
    assert_eq!(config.command_timeout_secs, 30);
    assert!(config.endpoints.jenkins_base_url.is_none());
    assert!(config.endpoints.bitbucket_base_url.is_none());
}

#[tokio::test]
async fn test_foreign_origin_is_rejected() {
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "https://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app("true\n").oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let error: ErrorResponse = body_json(response).await;
    assert!(!error.success);
    assert_eq!(error.message, "Origin not allowed");
}

#[tokio::test]
async fn test_local_origin_gets_cors_headers() {
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://localhost:5173")
        .body(Body::empty())
        .unwrap();
    let response = app("true\n").oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:5173"
    );
}

#[tokio::test]
async fn test_validate_target() {
    let dir = git_tree();
    let response = app("true\n")
        .oneshot(post_json(
            "/api/target/validate",
            json!({"folderPath": path_of(&dir)}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let target: TargetResponse = body_json(response).await;
    assert!(target.success);
    assert_eq!(target.message, "Valid Git repository");

    let plain = tempfile::tempdir().unwrap();
    let response = app("true\n")
        .oneshot(post_json(
            "/api/target/validate",
            json!({"folderPath": path_of(&plain)}),
        ))
        .await
        .unwrap();
    let target: TargetResponse = body_json(response).await;
    assert!(!target.success);
}

#[tokio::test]
async fn test_changes_lists_touched_services() {
    let dir = tempfile::tempdir().unwrap();
    let init = Command::new("git").arg("init").arg("-q").arg(dir.path()).status();
    if !init.is_ok_and(|s| s.success()) {
        // git is not installed here
        return;
    }
    std::fs::create_dir_all(dir.path().join("orders/src")).unwrap();
    std::fs::write(dir.path().join("orders/pom.xml"), "<project/>").unwrap();
    std::fs::write(dir.path().join("orders/src/App.java"), "class App {}").unwrap();
    std::fs::create_dir_all(dir.path().join("docs")).unwrap();
    std::fs::write(dir.path().join("docs/notes.md"), "notes").unwrap();

    let query: String =
        url::form_urlencoded::byte_serialize(path_of(&dir).as_bytes()).collect();
    let response = app("true\n")
        .oneshot(get(&format!("/api/changes?folderPath={}", query)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let changes: ChangesResponse = body_json(response).await;
    assert_eq!(changes.services, vec!["orders".to_string()]);
    assert!(changes.files.contains(&"docs/notes.md".to_string()));
}

#[tokio::test]
async fn test_start_requires_folder_path() {
    let response = app("true\n")
        .oneshot(post_json("/api/deploy/start", json!({"folderPath": "  "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_session_routes() {
    let app = app("true\n");

    let response = app
        .clone()
        .oneshot(post_json("/api/deploy/cancel/deploy_missing", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/api/deploy/stream/deploy_missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_jenkins_requires_configuration() {
    let response = app("true\n")
        .oneshot(get("/api/jenkins/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_sse_start_then_stream() {
    let dir = git_tree();
    let app = app("echo 'Building microservice: foo'\necho done\n");

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/deploy/start",
            json!({"folderPath": path_of(&dir)}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let start: DeployStartResponse = body_json(response).await;
    assert!(start.session_id.starts_with("deploy_"));

    let response = app
        .clone()
        .oneshot(get(&format!("/api/deploy/stream/{}", start.session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let mut stream = SseFrames::new(response);
    let mut frames = Vec::new();
    while let Some(frame) = stream.next_frame().await {
        let terminal = frame["type"] == "complete";
        frames.push(frame);
        if terminal {
            break;
        }
    }

    assert_eq!(
        frames.first(),
        Some(&json!({"type": "connected", "sessionId": start.session_id}))
    );
    assert!(frames
        .iter()
        .any(|f| f["type"] == "progress" && f["service"] == "foo" && f["stage"] == "build"));
    let last = frames.last().unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["success"], true);
    assert_eq!(frames.iter().filter(|f| f["type"] == "complete").count(), 1);

    // a second consumer for the same session is refused
    let response = app
        .oneshot(get(&format!("/api/deploy/stream/{}", start.session_id)))
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_sse_cancel_running_session() {
    let dir = git_tree();
    let app = app("echo started\nsleep 30\necho never\n");

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/deploy/start",
            json!({"folderPath": path_of(&dir)}),
        ))
        .await
        .unwrap();
    let start: DeployStartResponse = body_json(response).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/deploy/stream/{}", start.session_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let mut stream = SseFrames::new(response);

    assert_eq!(stream.next_frame().await.unwrap()["type"], "connected");
    loop {
        let frame = stream.next_frame().await.expect("stream ended before output");
        assert_ne!(frame["type"], "complete");
        if frame["type"] == "output" && frame["content"] == "started" {
            break;
        }
    }

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/deploy/cancel/{}", start.session_id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cancel: CancelResponse = body_json(response).await;
    assert_eq!(cancel.status, "cancelled");
    assert_eq!(cancel.session_id, start.session_id);

    let mut rest = Vec::new();
    while let Some(frame) = stream.next_frame().await {
        let terminal = frame["type"] == "complete";
        rest.push(frame);
        if terminal {
            break;
        }
    }
    assert!(!rest.iter().any(|f| f["content"] == "never"));
    assert_eq!(
        rest.last(),
        Some(&json!({"type": "complete", "success": false, "content": ABORTED_MESSAGE}))
    );
}

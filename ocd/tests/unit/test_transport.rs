//! WebSocket transport tests against a served router

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use ocd_api_models::models::OutputEvent;
use ocd_gui::app::options::ServerOptions;
use ocd_gui::deploy::runner::{ABORTED_MESSAGE, SUCCESS_MESSAGE};
use ocd_gui::deploy::SessionBroker;
use ocd_gui::server::serve::serve;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::common::{app_state, git_tree, path_of, server_state, EVENT_DEADLINE};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestServer {
    addr: SocketAddr,
    broker: Arc<SessionBroker>,
    stop: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(script: &str) -> Self {
        let app = app_state(script);
        let options = ServerOptions {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        };
        let (stop, stopped) = oneshot::channel::<()>();
        let (addr, _handle) = serve(&options, server_state(&app), async move {
            let _ = stopped.await;
        })
        .await
        .unwrap();
        Self {
            addr,
            broker: app.broker.clone(),
            stop: Some(stop),
        }
    }

    async fn connect(&self) -> Client {
        let (client, _) = connect_async(format!("ws://{}/ws/deploy", self.addr))
            .await
            .unwrap();
        client
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

async fn next_event(client: &mut Client) -> Option<OutputEvent> {
    loop {
        match tokio::time::timeout(EVENT_DEADLINE, client.next()).await.unwrap()? {
            Ok(Message::Text(text)) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

async fn read_to_end(client: &mut Client) -> Vec<OutputEvent> {
    let mut events = Vec::new();
    while let Some(event) = next_event(client).await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_ws_streams_deployment() {
    let dir = git_tree();
    let server = TestServer::start("echo 'Building microservice: foo'\necho tail\n").await;
    let mut client = server.connect().await;

    client
        .send(Message::Text(json!({"folderPath": path_of(&dir)}).to_string().into()))
        .await
        .unwrap();

    let events = read_to_end(&mut client).await;
    assert!(events.contains(&OutputEvent::output("Building microservice: foo")));
    assert!(events.iter().any(|e| matches!(
        e,
        OutputEvent::Progress(p) if p.service.as_deref() == Some("foo")
    )));
    assert_eq!(events.last(), Some(&OutputEvent::complete(true, SUCCESS_MESSAGE)));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[tokio::test]
async fn test_ws_cancel_frame_aborts() {
    let dir = git_tree();
    let server = TestServer::start("echo started\nsleep 30\n").await;
    let mut client = server.connect().await;

    client
        .send(Message::Text(json!({"folderPath": path_of(&dir)}).to_string().into()))
        .await
        .unwrap();
    assert_eq!(next_event(&mut client).await, Some(OutputEvent::output("started")));

    client
        .send(Message::Text(json!({"type": "cancel"}).to_string().into()))
        .await
        .unwrap();

    let events = read_to_end(&mut client).await;
    assert_eq!(events.last(), Some(&OutputEvent::complete(false, ABORTED_MESSAGE)));
}

#[tokio::test]
async fn test_ws_rejects_missing_folder() {
    let server = TestServer::start("true\n").await;
    let mut client = server.connect().await;

    client
        .send(Message::Text(json!({"folderPath": ""}).to_string().into()))
        .await
        .unwrap();

    let events = read_to_end(&mut client).await;
    assert_eq!(
        events,
        vec![OutputEvent::complete(false, "Folder path is required")]
    );
}

#[tokio::test]
async fn test_ws_invalid_target_single_failure() {
    let server = TestServer::start("echo never\n").await;
    let mut client = server.connect().await;

    client
        .send(Message::Text(json!({"folderPath": "/no/such/folder"}).to_string().into()))
        .await
        .unwrap();

    let events = read_to_end(&mut client).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], OutputEvent::Complete { success: false, .. }));
}

#[tokio::test]
async fn test_ws_disconnect_leaves_deployment_running() {
    let dir = git_tree();
    let server = TestServer::start("sleep 1\necho ok > done.txt\n").await;
    let mut client = server.connect().await;

    client
        .send(Message::Text(json!({"folderPath": path_of(&dir)}).to_string().into()))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    drop(client);

    let done = dir.path().join("done.txt");
    let deadline = Instant::now() + EVENT_DEADLINE;
    while !(done.exists() && server.broker.active_count().await == 0) {
        assert!(Instant::now() < deadline, "deployment did not finish after disconnect");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // nobody collected the terminal event, so the session waits for eviction
    assert_eq!(server.broker.len().await, 1);
    assert_eq!(server.broker.evict_finished(Duration::ZERO).await, 1);
    assert!(server.broker.is_empty().await);
}

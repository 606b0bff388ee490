//! WebSocket deployment transport

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use ocd_api_models::models::{ControlMessage, DeployRequest, OutputEvent};
use tracing::{debug, info, warn};

use crate::server::state::ServerState;

/// How long a client may take to send the deployment request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn deploy_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();

    let request = match read_request(&mut receiver).await {
        Ok(request) => request,
        Err(message) => {
            let _ = send_event(&mut sender, &OutputEvent::complete(false, message)).await;
            let _ = sender.close().await;
            return;
        }
    };

    let session = state.broker.start(&request.folder_path).await;
    let session_id = session.id().to_string();
    let Some(mut events) = session.take_events() else {
        warn!("Session {} already has a consumer", session_id);
        return;
    };
    info!("WebSocket client attached to session {}", session_id);

    // control frames are handled off the writer so a cancel never waits on output
    let broker = state.broker.clone();
    let control_id = session_id.clone();
    let control = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<ControlMessage>(text.as_str()) {
                    Ok(control) if control.is_cancel() => {
                        if let Err(e) = broker.cancel(&control_id).await {
                            debug!("Cancel for {} ignored: {}", control_id, e);
                        }
                    }
                    Ok(control) => debug!("Ignoring control message {:?}", control.kind),
                    Err(e) => debug!("Ignoring malformed control frame: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let mut delivered = false;
    while let Some(event) = events.recv().await {
        let terminal = event.is_terminal();
        if send_event(&mut sender, &event).await.is_err() {
            info!(
                "WebSocket client of session {} disconnected; deployment continues unobserved",
                session_id
            );
            break;
        }
        if terminal {
            delivered = true;
            break;
        }
    }

    control.abort();
    if delivered {
        let _ = sender.close().await;
        state.broker.remove(&session_id).await;
    }
}

/// First frame must be `{"folderPath": ...}`
async fn read_request(receiver: &mut SplitStream<WebSocket>) -> Result<DeployRequest, String> {
    let first_text = async {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => return Some(text),
                Message::Close(_) => return None,
                _ => {}
            }
        }
        None
    };

    let text = match tokio::time::timeout(REQUEST_TIMEOUT, first_text).await {
        Ok(Some(text)) => text,
        _ => return Err("Failed to read deployment request".to_string()),
    };

    let request: DeployRequest = serde_json::from_str(text.as_str())
        .map_err(|_| "Failed to read deployment request".to_string())?;
    if request.folder_path.trim().is_empty() {
        return Err("Folder path is required".to_string());
    }
    Ok(request)
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &OutputEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}

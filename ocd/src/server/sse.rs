//! Server-sent events deployment transport

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use ocd_api_models::models::{
    CancelResponse, DeployRequest, DeployStartResponse, StreamNotice,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};

use crate::errors::OcdError;
use crate::server::state::ServerState;

/// `POST /api/deploy/start`
pub async fn start_handler(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DeployRequest>,
) -> Result<Json<DeployStartResponse>, OcdError> {
    if request.folder_path.trim().is_empty() {
        return Err(OcdError::ValidationError("folder path is required".to_string()));
    }
    let session = state.broker.start(&request.folder_path).await;
    Ok(Json(DeployStartResponse {
        session_id: session.id().to_string(),
    }))
}

/// `GET /api/deploy/stream/{id}`
pub async fn stream_handler(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, OcdError> {
    let session = state
        .broker
        .get(&session_id)
        .await
        .ok_or_else(|| OcdError::NotFound(format!("session {}", session_id)))?;
    let mut events = session.take_events().ok_or_else(|| {
        OcdError::ValidationError(format!("session {} is already being streamed", session_id))
    })?;
    info!("SSE client attached to session {}", session_id);

    // single writer per connection; the session is released once its
    // terminal event has been handed over
    let (tx, rx) = mpsc::unbounded_channel();
    let broker = state.broker.clone();
    let id = session_id.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let terminal = event.is_terminal();
            if tx.send(sse_event(&event)).is_err() {
                info!("SSE client of session {} disconnected; deployment continues unobserved", id);
                return;
            }
            if terminal {
                broker.remove(&id).await;
                return;
            }
        }
    });

    let connected = sse_event(&StreamNotice::Connected { session_id });
    let stream = stream::once(async move { connected })
        .chain(UnboundedReceiverStream::new(rx))
        .map(Ok);

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(state.keepalive_interval)
            .event(sse_event(&StreamNotice::KeepAlive)),
    ))
}

/// `POST /api/deploy/cancel/{id}`
pub async fn cancel_handler(
    State(state): State<Arc<ServerState>>,
    Path(session_id): Path<String>,
) -> Result<Json<CancelResponse>, OcdError> {
    let ack = state.broker.cancel(&session_id).await?;
    info!("Cancel for session {}: {:?}", session_id, ack);
    Ok(Json(CancelResponse {
        status: "cancelled".to_string(),
        session_id,
    }))
}

fn sse_event<T: Serialize>(value: &T) -> Event {
    match serde_json::to_string(value) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            warn!("Failed to encode SSE frame: {}", e);
            Event::default().comment("encoding error")
        }
    }
}

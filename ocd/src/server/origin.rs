//! Browser origin allow-list

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ocd_api_models::models::ErrorResponse;
use tracing::warn;

use crate::server::state::ServerState;

/// Browser origins whose pages may drive the API.
///
/// An entry is matched according to what it names: a full origin
/// (`https://ui.example:8443`) must equal the request origin, a `host:port`
/// entry must equal its host and port, and only a bare host admits every
/// scheme and port on that host.
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    allow_all: bool,
    entries: Vec<String>,
}

impl OriginPolicy {
    pub fn new(allowed: &[String]) -> Self {
        Self {
            allow_all: allowed.iter().any(|o| o.trim() == "*"),
            entries: allowed
                .iter()
                .map(|o| o.trim().trim_end_matches('/').to_ascii_lowercase())
                .filter(|o| !o.is_empty() && o != "*")
                .collect(),
        }
    }

    pub fn allow_all() -> Self {
        Self {
            allow_all: true,
            entries: Vec::new(),
        }
    }

    /// Whether a request carrying `origin` may proceed.
    ///
    /// Requests without an `Origin` header come from non-browser clients and
    /// are allowed.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        if self.allow_all {
            return true;
        }
        let Some(origin) = origin else {
            return true;
        };
        let Ok(parsed) = url::Url::parse(origin) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };

        let full = origin.trim().trim_end_matches('/').to_ascii_lowercase();
        let host_port = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let bare_host = host.trim_start_matches('[').trim_end_matches(']');

        self.entries.iter().any(|entry| {
            *entry == full
                || *entry == host_port
                || entry.trim_start_matches('[').trim_end_matches(']') == bare_host
        })
    }
}

/// Reject cross-origin requests before any handler runs
pub async fn enforce_origin(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    if !state.origins.is_allowed(origin) {
        warn!("Rejected request from origin {:?} to {}", origin, request.uri());
        return (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse {
                success: false,
                message: "Origin not allowed".to_string(),
            }),
        )
            .into_response();
    }

    next.run(request).await
}

//! HTTP server setup

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::OcdError;
use crate::server::handlers::{
    build_status_handler, changes_handler, customization_branches_handler, health_handler,
    jenkins_health_handler, job_info_handler, public_config_handler, trigger_build_handler,
    validate_target_handler, version_handler,
};
use crate::server::origin::enforce_origin;
use crate::server::sse::{cancel_handler, start_handler, stream_handler};
use crate::server::state::ServerState;
use crate::server::ws::deploy_ws_handler;

/// Build the application router
pub fn router(state: Arc<ServerState>) -> Router {
    let policy = state.origins.clone();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            policy.is_allowed(origin.to_str().ok())
        }))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and version
        .route("/api/health", get(health_handler))
        .route("/api/version", get(version_handler))
        .route("/api/config/public", get(public_config_handler))
        // Deployment target
        .route("/api/target/validate", post(validate_target_handler))
        .route("/api/changes", get(changes_handler))
        // Deployment sessions
        .route("/ws/deploy", get(deploy_ws_handler))
        .route("/api/deploy/start", post(start_handler))
        .route("/api/deploy/stream/{id}", get(stream_handler))
        .route("/api/deploy/cancel/{id}", post(cancel_handler))
        // Jenkins
        .route("/api/jenkins/health", get(jenkins_health_handler))
        .route("/api/jenkins/job/{job}", get(job_info_handler))
        .route("/api/jenkins/job/{job}/build", post(trigger_build_handler))
        .route("/api/jenkins/job/{job}/{build}", get(build_status_handler))
        // Bitbucket
        .route(
            "/api/git/branches/customization",
            get(customization_branches_handler),
        )
        // State and middleware
        .layer(middleware::from_fn_with_state(state.clone(), enforce_origin))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server, returning the bound address and the serve task
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, JoinHandle<Result<(), OcdError>>), OcdError> {
    let app = router(state);

    let addr = options.addr();
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| OcdError::ServerError(format!("failed to bind {}: {}", addr, e)))?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| OcdError::ServerError(e.to_string()))
    });

    Ok((local_addr, handle))
}

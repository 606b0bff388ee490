//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use colored::Colorize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::AppState;
use crate::errors::OcdError;
use crate::server::origin::OriginPolicy;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::workers::retention;

/// Run the OCD GUI server
pub async fn run(
    version: String,
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), OcdError> {
    info!("Initializing OCD GUI {}...", version);

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start OCD GUI: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), OcdError> {
    let app_state = Arc::new(AppState::init(options)?);
    shutdown_manager.with_app_state(app_state.clone())?;

    init_retention_worker(
        options.retention_worker.clone(),
        app_state.clone(),
        shutdown_manager,
        shutdown_tx.subscribe(),
    )?;

    init_socket_server(options, app_state, shutdown_manager, shutdown_tx.subscribe()).await?;

    Ok(())
}

fn init_retention_worker(
    options: retention::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), OcdError> {
    info!("Initializing session retention worker...");

    let broker = app_state.broker.clone();
    let retention_handle = tokio::spawn(async move {
        retention::run(
            &options,
            broker.as_ref(),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_retention_worker_handle(retention_handle)
}

async fn init_socket_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), OcdError> {
    info!("Initializing local HTTP server...");

    let server_state = ServerState::new(
        &app_state,
        OriginPolicy::new(&options.server.allowed_origins),
    );

    let (addr, server_handle) = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;
    shutdown_manager.with_socket_server_handle(server_handle)?;

    let url = options.server.ui_url();
    println!(
        "{} listening on {} ({})",
        "OCD GUI".green().bold(),
        url.cyan(),
        addr
    );

    if options.open_browser {
        if let Err(e) = open_browser(&url).await {
            warn!("Could not open a browser: {}", e);
            println!("Open {} in your browser", url.cyan());
        }
    }
    Ok(())
}

/// Open `url` with the platform's default handler
pub async fn open_browser(url: &str) -> Result<(), OcdError> {
    let (program, args): (&str, Vec<&str>) = match std::env::consts::OS {
        "windows" => ("rundll32", vec!["url.dll,FileProtocolHandler", url]),
        "macos" => ("open", vec![url]),
        _ => ("xdg-open", vec![url]),
    };

    let status = tokio::process::Command::new(program)
        .args(&args)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .await?;
    if !status.success() {
        return Err(OcdError::Internal(format!("{} exited with {}", program, status)));
    }
    Ok(())
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    app_state: Option<Arc<AppState>>,
    socket_server_handle: Option<JoinHandle<Result<(), OcdError>>>,
    retention_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            app_state: None,
            socket_server_handle: None,
            retention_worker_handle: None,
        }
    }

    pub fn with_app_state(&mut self, state: Arc<AppState>) -> Result<(), OcdError> {
        if self.app_state.is_some() {
            return Err(OcdError::ShutdownError("app_state already set".to_string()));
        }
        self.app_state = Some(state);
        Ok(())
    }

    pub fn with_retention_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), OcdError> {
        if self.retention_worker_handle.is_some() {
            return Err(OcdError::ShutdownError("retention_handle already set".to_string()));
        }
        self.retention_worker_handle = Some(handle);
        Ok(())
    }

    pub fn with_socket_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), OcdError>>,
    ) -> Result<(), OcdError> {
        if self.socket_server_handle.is_some() {
            return Err(OcdError::ShutdownError("server_handle already set".to_string()));
        }
        self.socket_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), OcdError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), OcdError> {
        info!("Shutting down OCD GUI...");

        // 1. Running deployments; ends their open streams
        if let Some(app_state) = self.app_state.take() {
            app_state.shutdown().await?;
        }

        // 2. Socket server
        if let Some(handle) = self.socket_server_handle.take() {
            handle.await.map_err(|e| OcdError::ShutdownError(e.to_string()))??;
        }

        // 3. Retention worker
        if let Some(handle) = self.retention_worker_handle.take() {
            handle.await.map_err(|e| OcdError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}

//! Application configuration options

use std::time::Duration;

use crate::app::settings::{BitbucketSettings, JenkinsSettings, Settings};
use crate::deploy::RunnerOptions;
use crate::http::CiClientOptions;
use crate::workers::retention;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,

    /// Deployment process options
    pub runner: RunnerOptions,

    /// Linux user for the WSL launch strategy
    pub wsl_user: String,

    /// Session retention worker options
    pub retention_worker: retention::Options,

    /// Jenkins endpoint, when configured
    pub jenkins: Option<JenkinsSettings>,

    /// Bitbucket endpoint, when configured
    pub bitbucket: Option<BitbucketSettings>,

    /// Options shared by the CI clients
    pub ci_client: CiClientOptions,

    /// Open the UI in a browser once the server listens
    pub open_browser: bool,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions::default(),
            runner: RunnerOptions::default(),
            wsl_user: "k8s".to_string(),
            retention_worker: retention::Options::default(),
            jenkins: None,
            bitbucket: None,
            ci_client: CiClientOptions::default(),
            open_browser: true,
        }
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            server: ServerOptions {
                host: settings.host.clone(),
                port: settings.port,
                allowed_origins: settings.allowed_origins.clone(),
            },
            runner: RunnerOptions {
                timeout: settings.command_timeout,
                ..Default::default()
            },
            wsl_user: settings.wsl_user.clone(),
            retention_worker: retention::Options {
                retention: settings.session_retention,
                ..Default::default()
            },
            jenkins: settings.jenkins.clone(),
            bitbucket: settings.bitbucket.clone(),
            ci_client: CiClientOptions {
                insecure_skip_verify: settings.tls_insecure_skip_verify,
                ..Default::default()
            },
            open_browser: settings.open_browser,
            ..Default::default()
        }
    }
}

/// Lifecycle options for the server
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Browser origins allowed to use the API
    pub allowed_origins: Vec<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2111,
            allowed_origins: vec!["localhost".to_string(), "127.0.0.1".to_string()],
        }
    }
}

impl ServerOptions {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// URL the browser opens
    pub fn ui_url(&self) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" => "localhost",
            host => host,
        };
        format!("http://{}:{}", host, self.port)
    }
}

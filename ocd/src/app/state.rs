//! Application state management

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::deploy::{Platform, ProcessRunner, ScriptBundle, SessionBroker};
use crate::errors::OcdError;
use crate::http::CiClient;

const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Bitbucket client bound to the customization repository
pub struct BitbucketRepo {
    pub client: CiClient,
    pub project: String,
    pub repo: String,
}

/// Main application state
pub struct AppState {
    /// Deployment sessions
    pub broker: Arc<SessionBroker>,

    /// Jenkins client, when configured
    pub jenkins: Option<Arc<CiClient>>,

    /// Bitbucket client, when configured
    pub bitbucket: Option<Arc<BitbucketRepo>>,
}

impl AppState {
    /// Initialize application state
    pub fn init(options: &AppOptions) -> Result<Self, OcdError> {
        info!("Initializing application state...");

        let platform = Platform::detect(&options.wsl_user);
        info!("Deployment launch strategy: {:?}", platform);
        let runner = ProcessRunner::new(platform, ScriptBundle::embedded(), options.runner.clone());

        let jenkins = match &options.jenkins {
            Some(jenkins) => Some(Arc::new(CiClient::new(
                &jenkins.base_url,
                jenkins.credentials.clone(),
                options.ci_client.clone(),
            )?)),
            None => None,
        };

        let bitbucket = match &options.bitbucket {
            Some(bitbucket) => Some(Arc::new(BitbucketRepo {
                client: CiClient::new(
                    &bitbucket.base_url,
                    bitbucket.credentials.clone(),
                    options.ci_client.clone(),
                )?,
                project: bitbucket.project.clone(),
                repo: bitbucket.customization_repo.clone(),
            })),
            None => None,
        };

        Ok(Self {
            broker: Arc::new(SessionBroker::new(runner)),
            jenkins,
            bitbucket,
        })
    }

    /// State around an explicit runner, without CI integrations
    pub fn with_runner(runner: ProcessRunner) -> Self {
        Self {
            broker: Arc::new(SessionBroker::new(runner)),
            jenkins: None,
            bitbucket: None,
        }
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), OcdError> {
        info!("Shutting down application state...");
        self.broker.cancel_all().await;

        // give runners the chance to kill their process groups
        let deadline = tokio::time::Instant::now() + SESSION_DRAIN_TIMEOUT;
        while self.broker.active_count().await > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!("Deployments still running at shutdown");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }
}

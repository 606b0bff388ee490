//! Session broker owning every live deployment

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ocd_api_models::models::OutputEvent;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::deploy::runner::ProcessRunner;
use crate::deploy::session::{Outcome, Session};
use crate::deploy::target::DeploymentTarget;
use crate::errors::OcdError;
use crate::utils::generate_session_id;

/// Result of a cancel request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAck {
    /// The running deployment was asked to stop
    Cancelled,
    /// Cancel had been requested before
    AlreadyCancelled,
    /// The deployment had already ended
    AlreadyFinished,
}

/// Creates, tracks and cancels deployment sessions
pub struct SessionBroker {
    runner: Arc<ProcessRunner>,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionBroker {
    pub fn new(runner: ProcessRunner) -> Self {
        Self {
            runner: Arc::new(runner),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    /// Start a deployment for `folder_path`.
    ///
    /// A session is returned even when the folder is rejected; its stream
    /// then holds only the failing terminal event.
    pub async fn start(&self, folder_path: &str) -> Arc<Session> {
        let id = generate_session_id();
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new(id.clone(), folder_path.to_string(), rx));

        self.sessions
            .write()
            .await
            .insert(id.clone(), session.clone());

        match DeploymentTarget::validate(folder_path).await {
            Ok(target) => {
                info!("Session {} deploying {}", id, target);
                let runner = self.runner.clone();
                let session = session.clone();
                tokio::spawn(async move {
                    let outcome = runner.run(&target, session.cancel_token(), tx).await;
                    session.finish(outcome);
                    info!("Session {} finished: {}", session.id(), outcome);
                });
            }
            Err(e) => {
                warn!("Session {} rejected {:?}: {}", id, folder_path, e);
                let _ = tx.send(OutputEvent::complete(false, e.to_string()));
                session.finish(Outcome::Failure);
            }
        }

        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Request cancellation. Repeated calls are acknowledged without effect.
    pub async fn cancel(&self, id: &str) -> Result<CancelAck, OcdError> {
        let session = self
            .get(id)
            .await
            .ok_or_else(|| OcdError::NotFound(format!("session {}", id)))?;

        if session.is_finished() {
            debug!("Cancel for finished session {}", id);
            return Ok(CancelAck::AlreadyFinished);
        }
        if session.is_cancelled() {
            return Ok(CancelAck::AlreadyCancelled);
        }
        info!("Cancelling session {}", id);
        session.cancel_token().cancel();
        Ok(CancelAck::Cancelled)
    }

    /// Forget a session once its stream has been delivered
    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    pub async fn active_count(&self) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| !s.is_finished())
            .count()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop finished sessions nobody collected within `retention`
    pub async fn evict_finished(&self, retention: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.finished_for().is_none_or(|age| age < retention));
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} finished sessions", evicted);
        }
        evicted
    }

    /// Cancel every running deployment
    pub async fn cancel_all(&self) {
        for session in self.sessions.read().await.values() {
            if !session.is_finished() {
                session.cancel_token().cancel();
            }
        }
    }
}

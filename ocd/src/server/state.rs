//! Server state

use std::sync::Arc;
use std::time::Duration;

use crate::app::state::{AppState, BitbucketRepo};
use crate::deploy::SessionBroker;
use crate::http::CiClient;
use crate::server::origin::OriginPolicy;

/// Interval between SSE keep-alive frames
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Server state shared across handlers
pub struct ServerState {
    pub broker: Arc<SessionBroker>,
    pub jenkins: Option<Arc<CiClient>>,
    pub bitbucket: Option<Arc<BitbucketRepo>>,
    pub origins: OriginPolicy,
    pub keepalive_interval: Duration,
}

impl ServerState {
    pub fn new(app_state: &AppState, origins: OriginPolicy) -> Self {
        Self {
            broker: app_state.broker.clone(),
            jenkins: app_state.jenkins.clone(),
            bitbucket: app_state.bitbucket.clone(),
            origins,
            keepalive_interval: KEEPALIVE_INTERVAL,
        }
    }
}

//! Eviction of finished sessions no client collected

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info};

use crate::deploy::SessionBroker;

/// Retention worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// How long a finished session stays available to a late stream consumer
    pub retention: Duration,

    /// Sweep interval
    pub interval: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(600),
            interval: Duration::from_secs(60),
        }
    }
}

/// Run the retention worker
pub async fn run<S, F>(
    options: &Options,
    broker: &SessionBroker,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Session retention worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Session retention worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }

        let evicted = broker.evict_finished(options.retention).await;
        if evicted > 0 {
            debug!("Evicted {} stale sessions", evicted);
        }
    }
}

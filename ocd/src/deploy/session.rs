//! Deployment session record

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use ocd_api_models::models::OutputEvent;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

/// How a deployment ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Timeout,
    Aborted,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Timeout => "timeout",
            Outcome::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Finished(Outcome),
}

#[derive(Debug)]
struct Finish {
    status: SessionStatus,
    at: Option<Instant>,
}

/// One deployment and the stream of events it produces.
///
/// The event receiver can be taken exactly once; whichever transport takes
/// it becomes the sole consumer.
#[derive(Debug)]
pub struct Session {
    id: String,
    folder_path: String,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    finish: Mutex<Finish>,
    events: Mutex<Option<UnboundedReceiver<OutputEvent>>>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        folder_path: String,
        events: UnboundedReceiver<OutputEvent>,
    ) -> Self {
        Self {
            id,
            folder_path,
            started_at: Utc::now(),
            cancel: CancellationToken::new(),
            finish: Mutex::new(Finish {
                status: SessionStatus::Running,
                at: None,
            }),
            events: Mutex::new(Some(events)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn folder_path(&self) -> &str {
        &self.folder_path
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_finish().status
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status(), SessionStatus::Finished(_))
    }

    /// Record the outcome; only the first call has an effect
    pub(crate) fn finish(&self, outcome: Outcome) -> bool {
        let mut finish = self.lock_finish();
        if finish.status != SessionStatus::Running {
            return false;
        }
        finish.status = SessionStatus::Finished(outcome);
        finish.at = Some(Instant::now());
        true
    }

    /// Time elapsed since the session finished
    pub fn finished_for(&self) -> Option<Duration> {
        self.lock_finish().at.map(|at| at.elapsed())
    }

    /// Take the event receiver; `None` when another consumer already has it
    pub fn take_events(&self) -> Option<UnboundedReceiver<OutputEvent>> {
        match self.events.lock() {
            Ok(mut events) => events.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn lock_finish(&self) -> std::sync::MutexGuard<'_, Finish> {
        match self.finish.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

//! Deployment sessions and the process that backs them

pub mod broker;
pub mod platform;
pub mod runner;
pub mod scripts;
pub mod session;
pub mod target;

pub use broker::{CancelAck, SessionBroker};
pub use platform::Platform;
pub use runner::{ProcessRunner, RunnerOptions};
pub use scripts::ScriptBundle;
pub use session::{Outcome, Session, SessionStatus};
pub use target::DeploymentTarget;

//! OCD GUI
//!
//! Local web server that deploys changed microservices of a Git working tree
//! and streams the deployment's progress to a browser UI.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod git;
pub mod http;
pub mod logs;
pub mod progress;
pub mod server;
pub mod utils;
pub mod workers;

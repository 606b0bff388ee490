//! Local HTTP server

pub mod handlers;
pub mod origin;
pub mod serve;
pub mod sse;
pub mod state;
pub mod ws;

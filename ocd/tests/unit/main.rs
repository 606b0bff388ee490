//! Integration tests
#![cfg(unix)]

mod common;
mod test_broker;
mod test_retention;
mod test_routes;
mod test_transport;

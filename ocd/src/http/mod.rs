//! Jenkins and Bitbucket HTTP clients

pub mod bitbucket;
pub mod client;
pub mod jenkins;

pub use client::{CiClient, CiClientOptions, Credentials};

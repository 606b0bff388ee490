//! Wire models exposed to the browser UI

pub mod models;

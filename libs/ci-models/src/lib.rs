//! Jenkins and Bitbucket REST models

pub mod models;

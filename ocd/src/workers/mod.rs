//! Background workers

pub mod retention;

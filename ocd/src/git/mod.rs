//! Git working tree inspection

pub mod changes;

pub use changes::{changed_files, changed_services, ChangeSet};

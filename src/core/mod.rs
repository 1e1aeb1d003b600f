//! Core services and infrastructure

pub mod error_handling;
pub mod logging;
pub mod shutdown;
pub mod styles; // palette shared by CLI help and the summary table
pub mod sync;
pub mod version;

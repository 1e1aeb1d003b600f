//! Engine integration test modules

pub mod drain;
pub mod resolution;
pub mod retry;

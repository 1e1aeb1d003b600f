//! Local execution backend
//!
//! Runs calls published through the in-memory backend inside this process.
//! Used by the demo binary and by end-to-end tests to play the remote side.

pub mod api;
pub mod error;
pub mod local;
pub mod registry;

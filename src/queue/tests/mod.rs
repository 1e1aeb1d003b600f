//! Test modules for the queue engine
//!
//! Organized by component: ledger, pool, correlation, retry, drain and the
//! in-memory backend.

mod support;

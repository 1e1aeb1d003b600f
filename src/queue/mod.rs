//! Queue Correlation Engine
//!
//! Asynchronous remote invocation over an at-least-once message queue.
//! Callers enqueue a call and await its result; the engine correlates
//! result messages back to callers, re-publishes calls whose invocation
//! never started, and scales its polling to the backlog.
//!
//! # Architecture
//!
//! ```text
//!   caller ── enqueue_call_request ──► QueueOrchestrator
//!                                         │  register + publish
//!                                         ▼
//!        ┌──────────────── Correlator ───────────────┐
//!        │  PendingLedger  (CallId -> PendingRequest) │
//!        └───────▲─────────────────────────▲──────────┘
//!                │ poll_and_resolve        │ republish_stale
//!        ┌───────┴────────┐        ┌───────┴──────┐
//!        │ CollectorPool  │        │ RetryTicker  │
//!        │ (2..10 ticks)  │        │ (every 5s)   │
//!        └───────┬────────┘        └──────────────┘
//!                │ receive_messages
//!                ▼
//!           QueueBackend  ◄── results, functionstarted, stopqueue
//! ```
//!
//! Every result is delivered at most once: a matching message removes its
//! call from the ledger, so a redelivered copy finds nothing to resolve.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use callqueue::core::logging::LogTarget;
//! use callqueue::queue::api::{CallRequest, MemoryBackend, QueueOrchestrator, QueueSettings};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(MemoryBackend::new("demo"));
//! let response_queue = backend.response_queue_id().to_string();
//! let engine = QueueOrchestrator::new(
//!     Arc::clone(&backend),
//!     QueueSettings::default(),
//!     Arc::new(LogTarget::default()),
//! )?;
//!
//! let pending = engine
//!     .enqueue_call_request(CallRequest::new("c1", "square", json!(4)), &response_queue)
//!     .await?;
//! // ... something on the remote side answers on the response queue ...
//! let result = pending.await?;
//! println!("{}", result.payload);
//!
//! engine.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backend;
pub mod correlator;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod orchestrator;
pub mod pool;
pub mod retry;
pub mod settings;
pub mod types;

#[cfg(test)]
mod tests;

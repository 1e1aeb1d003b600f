//! Shared helpers for integration tests
//!
//! A [`Harness`] wires an in-memory backend, a local executor playing the
//! remote side and a queue engine, with intervals short enough for tests to
//! run on the real clock.

#![allow(dead_code)]

use callqueue::core::logging::MemorySink;
use callqueue::executor::api::{ExecutorOptions, FunctionRegistry, LocalExecutor};
use callqueue::queue::api::{
    CallRequest, CallResult, MemoryBackend, MemoryMessage, PendingCall, QueueOrchestrator,
    QueueResult, QueueSettings,
};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for any single await in these tests
pub const LIMIT: Duration = Duration::from_secs(10);

pub fn fast_settings() -> QueueSettings {
    QueueSettings {
        min_collectors: 2,
        max_collectors: 4,
        backlog_per_collector: 5,
        retry_interval: Duration::from_millis(100),
        retry_grace: Duration::from_millis(80),
        drain_delay: Duration::from_millis(5),
        idle_poll_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

pub fn fast_backend(name: &str) -> MemoryBackend {
    MemoryBackend::new(name).with_receive_wait(Duration::from_millis(20))
}

pub struct Harness {
    pub backend: MemoryBackend,
    pub executor: Option<LocalExecutor>,
    pub engine: QueueOrchestrator<MemoryBackend>,
    pub sink: Arc<MemorySink>,
}

impl Harness {
    /// Engine and executor over a fresh backend
    pub fn start(name: &str, options: ExecutorOptions) -> Self {
        let backend = fast_backend(name);
        let executor = LocalExecutor::start(&backend, FunctionRegistry::with_builtins(), options);
        Self::with_executor(backend, Some(executor), fast_settings())
    }

    /// Engine only; nothing answers the calls unless the test does
    pub fn without_executor(name: &str) -> Self {
        Self::with_executor(fast_backend(name), None, fast_settings())
    }

    pub fn with_executor(
        backend: MemoryBackend,
        executor: Option<LocalExecutor>,
        settings: QueueSettings,
    ) -> Self {
        let sink = Arc::new(MemorySink::new());
        let engine = QueueOrchestrator::new(Arc::new(backend.clone()), settings, sink.clone())
            .expect("valid settings");
        Self {
            backend,
            executor,
            engine,
            sink,
        }
    }

    pub async fn call(&self, call_id: &str, function: &str, args: Value) -> PendingCall<MemoryMessage> {
        self.engine
            .enqueue_call_request(
                CallRequest::new(call_id, function, args),
                self.backend.response_queue_id(),
            )
            .await
            .expect("enqueue")
    }

    pub fn executor(&self) -> &LocalExecutor {
        self.executor.as_ref().expect("harness has an executor")
    }

    pub async fn shutdown(mut self) {
        within(self.engine.stop()).await.expect("stop");
        if let Some(executor) = self.executor.take() {
            within(executor.shutdown()).await;
        }
    }
}

/// Await with the shared time limit
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(LIMIT, future)
        .await
        .expect("timed out")
}

/// Poll `condition` every few milliseconds until it holds or the limit passes
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + LIMIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

pub fn value(result: QueueResult<CallResult<MemoryMessage>>) -> Value {
    let result = result.expect("call resolved");
    assert!(!result.is_error(), "unexpected error result: {:?}", result.error());
    result.value().cloned().unwrap_or(Value::Null)
}


//! Local Executor
//!
//! Plays the remote side against a [`MemoryBackend`]: worker tasks take
//! calls off the request queue, announce that execution started, run the
//! function from a [`FunctionRegistry`] and publish the result tagged with
//! the call's id.
//!
//! `drop_invocations` discards the first N calls it receives without a
//! start signal, the way a lost invocation trigger would.

use crate::core::shutdown::ShutdownCoordinator;
use crate::executor::error::{ExecutorError, ExecutorResult};
use crate::executor::registry::FunctionRegistry;
use crate::queue::api::{CallEnvelope, MemoryBackend, MemoryMessage, QueueMessage};
use chrono::Utc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Number of worker tasks
    pub workers: usize,
    /// Invocations to discard before executing anything
    pub drop_invocations: usize,
    /// Calls taken per receive
    pub batch_size: usize,
    /// How long one receive waits for calls
    pub poll_wait: Duration,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            drop_invocations: 0,
            batch_size: 1,
            poll_wait: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Default)]
struct ExecutorStats {
    invocations: AtomicUsize,
    dropped: AtomicUsize,
    completed: AtomicUsize,
    to_drop: AtomicUsize,
}

pub struct LocalExecutor {
    shutdown: ShutdownCoordinator,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<ExecutorStats>,
}

impl LocalExecutor {
    /// Spawn the workers. Must be called inside a tokio runtime.
    pub fn start(backend: &MemoryBackend, registry: FunctionRegistry, options: ExecutorOptions) -> Self {
        let shutdown = ShutdownCoordinator::new();
        let stats = Arc::new(ExecutorStats::default());
        stats.to_drop.store(options.drop_invocations, Ordering::Relaxed);
        let registry = Arc::new(registry);

        let workers = (0..options.workers.max(1))
            .map(|worker| {
                let backend = backend.clone();
                let registry = Arc::clone(&registry);
                let stats = Arc::clone(&stats);
                let mut signal = shutdown.subscribe();
                let options = options.clone();
                tokio::spawn(async move {
                    log::debug!("Executor worker {} started", worker);
                    loop {
                        let received = tokio::select! {
                            _ = signal.wait() => break,
                            received = backend.next_calls(options.batch_size, options.poll_wait) => received,
                        };
                        let calls = match received {
                            Ok(calls) => calls,
                            Err(e) => {
                                log::warn!("Executor worker {} failed to receive calls: {}", worker, e);
                                tokio::time::sleep(options.poll_wait).await;
                                continue;
                            }
                        };
                        for message in calls {
                            if let Err(e) = handle_call(&backend, &registry, &stats, &message).await {
                                log::warn!("Executor worker {}: {}", worker, e);
                            }
                        }
                    }
                    log::debug!("Executor worker {} stopped", worker);
                })
            })
            .collect();

        Self {
            shutdown,
            workers,
            stats,
        }
    }

    /// Discard the next `count` invocations
    pub fn drop_invocations(&self, count: usize) {
        self.stats.to_drop.store(count, Ordering::Relaxed);
    }

    /// Calls received, including dropped ones
    pub fn invocations(&self) -> usize {
        self.stats.invocations.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> usize {
        self.stats.dropped.load(Ordering::Relaxed)
    }

    /// Calls executed, counted before their result is published
    pub fn completed(&self) -> usize {
        self.stats.completed.load(Ordering::Relaxed)
    }

    /// Stop the workers after their current call
    pub async fn shutdown(self) {
        self.shutdown.trigger_shutdown();
        for worker in self.workers {
            if let Err(e) = worker.await {
                if e.is_panic() {
                    log::error!("Executor worker panicked: {}", e);
                }
            }
        }
    }
}

async fn handle_call(
    backend: &MemoryBackend,
    registry: &FunctionRegistry,
    stats: &ExecutorStats,
    message: &MemoryMessage,
) -> ExecutorResult<()> {
    let envelope: CallEnvelope =
        serde_json::from_str(message.body()).map_err(|e| ExecutorError::MalformedCall {
            message: e.to_string(),
        })?;
    stats.invocations.fetch_add(1, Ordering::Relaxed);

    let drop_this = stats
        .to_drop
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok();
    if drop_this {
        stats.dropped.fetch_add(1, Ordering::Relaxed);
        log::debug!("Dropping invocation of call {}", envelope.call_id);
        return Ok(());
    }

    if envelope.response_queue_id != backend.response_queue_id() {
        log::warn!(
            "Call {} asks for results on {}, answering on {}",
            envelope.call_id,
            envelope.response_queue_id,
            backend.response_queue_id()
        );
    }

    backend.signal_started(&envelope.call_id)?;
    let result = registry.execute(&envelope, Utc::now()).await;
    stats.completed.fetch_add(1, Ordering::Relaxed);
    backend.respond(&envelope.call_id, serde_json::to_string(&result)?)?;
    log::trace!("Executed call {} ({})", envelope.call_id, envelope.name);
    Ok(())
}

//! Adaptive Collector Pool
//!
//! A bounded pool that keeps up to `max_concurrency` instances of one task
//! in flight, replacing each instance as it completes. The ceiling can move
//! at any time: raising it admits new instances straight away, lowering it
//! lets surplus instances finish and simply not be replaced.
//!
//! The pool knows nothing about queues; the orchestrator feeds it the
//! poll-and-resolve tick.

use crate::core::logging::DiagnosticSink;
use crate::core::sync::lock_recovering;
use crate::diag;
use futures::future::BoxFuture;
use log::Level;
use std::sync::{Arc, Mutex, Weak};

/// The repeating unit of work run by the pool
pub type CollectorTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Anything whose concurrency ceiling can be adjusted
pub trait ConcurrencyControl: Send + Sync {
    /// Set the ceiling, returning the value actually applied
    fn set_max_concurrency(&self, max: usize) -> usize;
}

/// Floor and cap the ceiling is clamped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub floor: usize,
    pub cap: usize,
}

impl PoolLimits {
    pub fn new(floor: usize, cap: usize) -> Self {
        Self {
            floor,
            cap: cap.max(floor),
        }
    }

    pub fn clamp(&self, value: usize) -> usize {
        value.clamp(self.floor, self.cap)
    }
}

#[derive(Debug)]
struct PoolState {
    current: usize,
    max: usize,
    stopped: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    limits: PoolLimits,
    task: CollectorTask,
    sink: Arc<dyn DiagnosticSink>,
}

/// Bounded, resizable pool of repeating task instances
pub struct CollectorPool {
    inner: Arc<PoolInner>,
}

/// Weak handle for adjusting a pool from inside its own task
#[derive(Clone)]
pub struct PoolHandle {
    inner: Weak<PoolInner>,
}

impl CollectorPool {
    /// Build a stopped pool. `make_task` receives a handle to the pool so the
    /// task can resize it.
    pub fn new(
        limits: PoolLimits,
        initial_max: usize,
        sink: Arc<dyn DiagnosticSink>,
        make_task: impl FnOnce(PoolHandle) -> CollectorTask,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak| PoolInner {
            state: Mutex::new(PoolState {
                current: 0,
                max: limits.clamp(initial_max),
                stopped: true,
            }),
            limits,
            task: make_task(PoolHandle {
                inner: weak.clone(),
            }),
            sink,
        });
        Self { inner }
    }

    /// Begin admitting task instances. Must be called inside a tokio runtime.
    pub fn start(&self) {
        lock_recovering(&self.inner.state).stopped = false;
        fill(&self.inner);
    }

    /// Stop admitting instances. In-flight instances run to completion.
    pub fn stop(&self) {
        lock_recovering(&self.inner.state).stopped = true;
    }

    pub fn set_max_concurrency(&self, max: usize) -> usize {
        set_max(&self.inner, max)
    }

    pub fn current_concurrency(&self) -> usize {
        lock_recovering(&self.inner.state).current
    }

    pub fn max_concurrency(&self) -> usize {
        lock_recovering(&self.inner.state).max
    }

    pub fn is_stopped(&self) -> bool {
        lock_recovering(&self.inner.state).stopped
    }

    pub fn limits(&self) -> PoolLimits {
        self.inner.limits
    }

    pub fn handle(&self) -> PoolHandle {
        PoolHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Drop for CollectorPool {
    fn drop(&mut self) {
        self.stop();
    }
}

impl PoolHandle {
    pub fn current_concurrency(&self) -> usize {
        self.inner
            .upgrade()
            .map(|inner| lock_recovering(&inner.state).current)
            .unwrap_or(0)
    }

    pub fn max_concurrency(&self) -> Option<usize> {
        self.inner
            .upgrade()
            .map(|inner| lock_recovering(&inner.state).max)
    }
}

impl ConcurrencyControl for PoolHandle {
    fn set_max_concurrency(&self, max: usize) -> usize {
        match self.inner.upgrade() {
            Some(inner) => set_max(&inner, max),
            None => 0,
        }
    }
}

impl ConcurrencyControl for CollectorPool {
    fn set_max_concurrency(&self, max: usize) -> usize {
        set_max(&self.inner, max)
    }
}

fn set_max(inner: &Arc<PoolInner>, max: usize) -> usize {
    let (applied, running) = {
        let mut state = lock_recovering(&inner.state);
        state.max = inner.limits.clamp(max);
        (state.max, !state.stopped)
    };
    if running {
        fill(inner);
    }
    applied
}

/// Admit instances until the ceiling is reached
fn fill(inner: &Arc<PoolInner>) {
    let admitted = {
        let mut state = lock_recovering(&inner.state);
        let mut admitted = 0;
        while !state.stopped && state.current < state.max {
            state.current += 1;
            admitted += 1;
        }
        admitted
    };
    for _ in 0..admitted {
        spawn_instance(Arc::clone(inner));
    }
}

fn spawn_instance(inner: Arc<PoolInner>) {
    let future = (inner.task)();
    tokio::spawn(async move {
        let mut guard = InstanceGuard {
            inner,
            completed: false,
        };
        future.await;
        guard.completed = true;
    });
}

// Releases the instance's slot however the instance ends
struct InstanceGuard {
    inner: Arc<PoolInner>,
    completed: bool,
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        {
            let mut state = lock_recovering(&self.inner.state);
            state.current = state.current.saturating_sub(1);
        }
        if self.completed {
            fill(&self.inner);
        } else if std::thread::panicking() {
            diag!(
                self.inner.sink,
                Level::Error,
                "Collector instance panicked; slot released without replacement"
            );
        }
    }
}

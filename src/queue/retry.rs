//! Retry Ticker
//!
//! Background task that periodically re-publishes calls which look like their
//! invocation never started. It is stopped through a [`ShutdownCoordinator`]
//! so the drain can halt it deterministically.

use crate::core::logging::DiagnosticSink;
use crate::core::shutdown::ShutdownCoordinator;
use crate::diag;
use crate::queue::backend::QueueBackend;
use crate::queue::correlator::Correlator;
use log::Level;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

pub struct RetryTicker {
    shutdown: ShutdownCoordinator,
    handle: Option<JoinHandle<()>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl RetryTicker {
    /// Spawn the ticker. The first tick fires one `interval` after start.
    pub fn start<B: QueueBackend>(correlator: Arc<Correlator<B>>, interval: Duration) -> Self {
        let shutdown = ShutdownCoordinator::new();
        let mut signal = shutdown.subscribe();
        let sink = Arc::clone(correlator.sink());

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = signal.wait() => break,
                    now = ticker.tick() => {
                        // A publish that never completes must not hold up cancellation
                        let outcome = tokio::select! {
                            _ = signal.wait() => break,
                            outcome = correlator.republish_stale(now) => outcome,
                        };
                        match outcome {
                            Ok(0) => {}
                            Ok(count) => diag!(
                                correlator.sink(),
                                Level::Debug,
                                "Retry tick re-published {} call(s)",
                                count
                            ),
                            Err(e) => diag!(
                                correlator.sink(),
                                Level::Error,
                                "Retry tick failed: {}",
                                e
                            ),
                        }
                    }
                }
            }
            diag!(correlator.sink(), Level::Debug, "Retry ticker stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
            sink,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the ticker. An in-progress tick is abandoned at its next await.
    pub async fn cancel(mut self) {
        self.shutdown.trigger_shutdown();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    diag!(self.sink, Level::Error, "Retry ticker panicked: {}", e);
                }
            }
        }
    }
}

impl Drop for RetryTicker {
    fn drop(&mut self) {
        self.shutdown.trigger_shutdown();
    }
}

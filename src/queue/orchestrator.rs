//! Queue Orchestrator
//!
//! Public face of the engine. Construction starts the collector pool (fed
//! with the poll-and-resolve tick) and the retry ticker; [`QueueOrchestrator::stop`]
//! runs the drain:
//!
//! 1. stop admitting collector instances
//! 2. cancel the retry ticker
//! 3. reject every pending call with a cancellation error
//! 4. publish stop signals until no collector is in flight, within a bound

use crate::core::logging::DiagnosticSink;
use crate::core::sync::handle_mutex_poison;
use crate::diag;
use crate::queue::backend::{ControlKind, QueueBackend};
use crate::queue::correlator::Correlator;
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::ledger::PendingCall;
use crate::queue::pool::{CollectorPool, CollectorTask, PoolLimits};
use crate::queue::retry::RetryTicker;
use crate::queue::settings::QueueSettings;
use crate::queue::types::CallRequest;
use futures::future::BoxFuture;
use log::Level;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Summary of one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Calls rejected with a cancellation error
    pub rejected: usize,
    /// Stop signals published while waiting for collectors
    pub stop_signals_sent: usize,
    /// Collector instances still in flight when the drain gave up
    pub collectors_remaining: usize,
}

pub struct QueueOrchestrator<B: QueueBackend> {
    correlator: Arc<Correlator<B>>,
    collectors: CollectorPool,
    retry: Mutex<Option<RetryTicker>>,
    stopped: AtomicBool,
}

impl<B: QueueBackend> QueueOrchestrator<B> {
    /// Validate settings and start collectors and the retry ticker.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn new(
        backend: Arc<B>,
        settings: QueueSettings,
        sink: Arc<dyn DiagnosticSink>,
    ) -> QueueResult<Self> {
        let correlator = Arc::new(Correlator::new(backend, settings, sink)?);
        let settings = correlator.settings();
        let limits = PoolLimits::new(settings.min_collectors, settings.max_collectors);
        let retry_interval = settings.retry_interval;

        let task_correlator = Arc::clone(&correlator);
        let pool_sink = Arc::clone(correlator.sink());
        let collectors = CollectorPool::new(limits, limits.floor, pool_sink, move |handle| {
            let task: CollectorTask = Arc::new(move || -> BoxFuture<'static, ()> {
                let correlator = Arc::clone(&task_correlator);
                let handle = handle.clone();
                Box::pin(async move {
                    if let Err(e) = correlator.poll_and_resolve(&handle).await {
                        diag!(correlator.sink(), Level::Warn, "Collector tick failed: {}", e);
                        // Keeps a persistently failing backend from being hammered
                        tokio::time::sleep(correlator.settings().idle_poll_interval).await;
                    }
                })
            });
            task
        });
        collectors.start();

        let retry = RetryTicker::start(Arc::clone(&correlator), retry_interval);

        diag!(
            correlator.sink(),
            Level::Info,
            "Queue engine started on {} with {} collector(s)",
            correlator.backend().description(),
            limits.floor
        );

        Ok(Self {
            correlator,
            collectors,
            retry: Mutex::new(Some(retry)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Submit a call and return the future of its result.
    ///
    /// A publish failure is returned to the caller, but the call stays
    /// pending so the retry ticker can still deliver it.
    pub async fn enqueue_call_request(
        &self,
        call: CallRequest,
        response_queue_id: &str,
    ) -> QueueResult<PendingCall<B::Message>> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(QueueError::Stopped);
        }
        let (body, pending) = self.correlator.register(&call, response_queue_id)?;
        diag!(
            self.correlator.sink(),
            Level::Debug,
            "Enqueued call {} ({})",
            call.call_id,
            call.name
        );
        self.correlator.publish_call(&call.call_id, body).await?;
        Ok(pending)
    }

    /// Drain and shut down the engine. Calling it again is a no-op.
    pub async fn stop(&self) -> QueueResult<DrainReport> {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return Ok(DrainReport::default());
        }
        let sink = self.correlator.sink();

        self.collectors.stop();

        let retry = handle_mutex_poison(self.retry.lock(), |message| QueueError::Internal {
            message,
        })?
        .take();
        if let Some(retry) = retry {
            retry.cancel().await;
        }

        let rejected = self.correlator.reject_all_pending()?;
        if rejected > 0 {
            diag!(sink, Level::Info, "Cancelled {} pending call(s)", rejected);
        }
        self.correlator.wake_idle_collectors();

        let settings = self.correlator.settings();
        let mut report = DrainReport {
            rejected,
            ..Default::default()
        };
        for _ in 0..settings.drain_iterations {
            match self
                .correlator
                .backend()
                .publish_control_message(ControlKind::StopQueue, None)
                .await
            {
                Ok(()) => report.stop_signals_sent += 1,
                Err(e) => diag!(sink, Level::Warn, "Failed to publish stop signal: {}", e),
            }
            tokio::time::sleep(settings.drain_delay).await;
            if self.collectors.current_concurrency() == 0 {
                break;
            }
        }

        report.collectors_remaining = self.collectors.current_concurrency();
        if report.collectors_remaining > 0 {
            diag!(
                sink,
                Level::Warn,
                "{} collector(s) still running after drain",
                report.collectors_remaining
            );
        }
        diag!(
            sink,
            Level::Info,
            "Queue engine on {} stopped",
            self.correlator.backend().description()
        );
        Ok(report)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn pending_count(&self) -> QueueResult<usize> {
        self.correlator.pending_count()
    }

    pub fn collector_concurrency(&self) -> usize {
        self.collectors.current_concurrency()
    }

    pub fn collector_max_concurrency(&self) -> usize {
        self.collectors.max_concurrency()
    }

    pub fn description(&self) -> String {
        self.correlator.backend().description()
    }

    pub fn settings(&self) -> &QueueSettings {
        self.correlator.settings()
    }
}

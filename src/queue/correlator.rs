//! Call/result correlation
//!
//! The [`Correlator`] owns the pending ledger and the backend. It publishes
//! calls, runs one poll-and-resolve tick at a time on behalf of a collector,
//! and re-publishes calls that never reported starting.

use crate::core::logging::DiagnosticSink;
use crate::core::sync::handle_mutex_poison;
use crate::diag;
use crate::queue::backend::{ControlKind, QueueBackend, QueueMessage};
use crate::queue::error::{QueueError, QueueResult};
use crate::queue::ledger::{PendingCall, PendingLedger, PendingRequest};
use crate::queue::pool::ConcurrencyControl;
use crate::queue::settings::QueueSettings;
use crate::queue::types::{
    call_id_attributes, CallEnvelope, CallRequest, CallResult, CALL_ID_ATTRIBUTE,
};
use log::Level;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::time::Instant;

/// What one poll-and-resolve tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was pending, so the backend was not polled
    Idle,
    /// The whole batch was scanned and matching calls resolved
    Resolved { received: usize, resolved: usize },
    /// A stop signal ended the scan; calls matched before it were still resolved
    Aborted { resolved: usize },
}

pub struct Correlator<B: QueueBackend> {
    backend: Arc<B>,
    ledger: Mutex<PendingLedger<B::Message>>,
    settings: QueueSettings,
    sink: Arc<dyn DiagnosticSink>,
    work_available: Notify,
}

impl<B: QueueBackend> Correlator<B> {
    pub fn new(
        backend: Arc<B>,
        settings: QueueSettings,
        sink: Arc<dyn DiagnosticSink>,
    ) -> QueueResult<Self> {
        settings.validate()?;
        Ok(Self {
            backend,
            ledger: Mutex::new(PendingLedger::new()),
            settings,
            sink,
            work_available: Notify::new(),
        })
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.settings
    }

    pub fn sink(&self) -> &Arc<dyn DiagnosticSink> {
        &self.sink
    }

    fn ledger(&self) -> QueueResult<MutexGuard<'_, PendingLedger<B::Message>>> {
        handle_mutex_poison(self.ledger.lock(), |message| QueueError::Internal { message })
    }

    /// Serialize a call and add it to the ledger.
    ///
    /// Returns the body to publish and the caller's future. Idle collectors
    /// are woken so the first poll does not wait out the idle interval.
    pub fn register(
        &self,
        call: &CallRequest,
        response_queue_id: &str,
    ) -> QueueResult<(String, PendingCall<B::Message>)> {
        let body = CallEnvelope::new(call, response_queue_id).to_body()?;
        let (request, pending) =
            PendingRequest::new(call.call_id.clone(), body.clone(), Instant::now());
        self.ledger()?.insert(request)?;
        self.work_available.notify_waiters();
        Ok((body, pending))
    }

    /// Publish a serialized call tagged with its correlation id
    pub async fn publish_call(&self, call_id: &str, body: String) -> QueueResult<()> {
        self.backend
            .publish_message(body, Some(call_id_attributes(call_id)))
            .await?;
        Ok(())
    }

    /// One collector tick: receive a batch, rescale the pool, match results.
    pub async fn poll_and_resolve(
        &self,
        control: &dyn ConcurrencyControl,
    ) -> QueueResult<TickOutcome> {
        // Registered before the emptiness check so an enqueue in between is not missed
        let notified = self.work_available.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.ledger()?.is_empty() {
            let _ = tokio::time::timeout(self.settings.idle_poll_interval, notified).await;
            return Ok(TickOutcome::Idle);
        }

        let batch = self.backend.receive_messages().await?;
        let received = batch.messages.len();

        let pending = self.ledger()?.len();
        let target = self.settings.target_collectors(pending, batch.is_full_batch);
        let applied = control.set_max_concurrency(target);
        diag!(
            self.sink,
            Level::Trace,
            "Received {} message(s) (full batch: {}), {} pending, collector ceiling {}",
            received,
            batch.is_full_batch,
            pending,
            applied
        );

        let mut staged = Vec::new();
        let mut stop_seen = false;
        {
            let mut ledger = self.ledger()?;
            for message in batch.messages {
                if message.is_control(ControlKind::StopQueue) {
                    stop_seen = true;
                    break;
                }
                let call_id = message.attribute(CALL_ID_ATTRIBUTE).map(str::to_string);
                if message.is_control(ControlKind::FunctionStarted) {
                    if let Some(call_id) = call_id {
                        if ledger.mark_executing(&call_id) {
                            diag!(self.sink, Level::Debug, "Call {} started remotely", call_id);
                        }
                    }
                    continue;
                }
                let Some(call_id) = call_id else {
                    diag!(
                        self.sink,
                        Level::Debug,
                        "Skipping message without {} attribute",
                        CALL_ID_ATTRIBUTE
                    );
                    continue;
                };
                match ledger.take(&call_id) {
                    Some(request) => staged.push((message, request)),
                    None => diag!(
                        self.sink,
                        Level::Debug,
                        "Discarding duplicate result for call {}",
                        call_id
                    ),
                }
            }
        }

        let resolved = self.resolve_staged(staged);
        if stop_seen {
            diag!(
                self.sink,
                Level::Debug,
                "Stop signal received, collector tick ends after resolving {}",
                resolved
            );
            Ok(TickOutcome::Aborted { resolved })
        } else {
            Ok(TickOutcome::Resolved { received, resolved })
        }
    }

    fn resolve_staged(&self, staged: Vec<(B::Message, PendingRequest<B::Message>)>) -> usize {
        let resolved = staged.len();
        for (message, request) in staged {
            let call_id = request.call_id().to_string();
            let result = CallResult::from_message(message, self.sink.as_ref());
            if !request.resolve(result) {
                diag!(
                    self.sink,
                    Level::Debug,
                    "Caller for call {} is gone; result dropped",
                    call_id
                );
            }
        }
        resolved
    }

    /// Re-publish calls older than the retry grace that never reported starting.
    ///
    /// Only runs while the backlog is inside the retry window. Publish failures
    /// are logged and the call stays pending for the next tick.
    pub async fn republish_stale(&self, now: Instant) -> QueueResult<usize> {
        let stale = {
            let ledger = self.ledger()?;
            if !self.settings.retries_enabled_for(ledger.len()) {
                return Ok(0);
            }
            ledger.stale_calls(now, self.settings.retry_grace)
        };

        let mut republished = 0;
        for call in stale {
            match self
                .backend
                .publish_message(call.serialized_call, Some(call_id_attributes(&call.call_id)))
                .await
            {
                Ok(()) => {
                    republished += 1;
                    diag!(self.sink, Level::Info, "Re-published call {}", call.call_id);
                }
                Err(e) => diag!(
                    self.sink,
                    Level::Warn,
                    "Failed to re-publish call {}: {}",
                    call.call_id,
                    e
                ),
            }
        }
        Ok(republished)
    }

    /// Reject every pending call with a cancellation error and close the ledger
    pub fn reject_all_pending(&self) -> QueueResult<usize> {
        let rejected = self
            .ledger()?
            .reject_all_and_clear(|call_id| QueueError::Cancelled {
                call_id: call_id.to_string(),
            });
        Ok(rejected)
    }

    /// End the idle wait of every collector
    pub fn wake_idle_collectors(&self) {
        self.work_available.notify_waiters();
    }

    pub fn pending_count(&self) -> QueueResult<usize> {
        Ok(self.ledger()?.len())
    }

    pub fn is_executing(&self, call_id: &str) -> QueueResult<Option<bool>> {
        Ok(self.ledger()?.is_executing(call_id))
    }
}

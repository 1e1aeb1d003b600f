//! Pending Request Ledger
//!
//! Maps correlation ids to calls whose result has not arrived yet. An id is
//! present exactly while its call is unresolved; removing it is the only way
//! to obtain the request's result sender, so a result can be delivered at
//! most once even when the transport delivers the same message twice.

use crate::queue::error::{QueueError, QueueResult};
use crate::queue::types::{CallResult, CorrelationId};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;

type ResultSender<M> = oneshot::Sender<QueueResult<CallResult<M>>>;

/// An in-flight call owned by the ledger
pub struct PendingRequest<M> {
    call_id: CorrelationId,
    serialized_call: String,
    created_at: Instant,
    executing: bool,
    sender: ResultSender<M>,
}

impl<M> PendingRequest<M> {
    /// Create a request and the future its caller will await
    pub fn new(
        call_id: impl Into<CorrelationId>,
        serialized_call: String,
        created_at: Instant,
    ) -> (Self, PendingCall<M>) {
        let call_id = call_id.into();
        let (sender, receiver) = oneshot::channel();
        let request = Self {
            call_id: call_id.clone(),
            serialized_call,
            created_at,
            executing: false,
            sender,
        };
        (request, PendingCall { call_id, receiver })
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn serialized_call(&self) -> &str {
        &self.serialized_call
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    /// Fulfil the caller's future. Returns false if the caller went away.
    pub fn resolve(self, result: CallResult<M>) -> bool {
        self.sender.send(Ok(result)).is_ok()
    }

    /// Reject the caller's future. Returns false if the caller went away.
    pub fn reject(self, error: QueueError) -> bool {
        self.sender.send(Err(error)).is_ok()
    }
}

impl<M> std::fmt::Debug for PendingRequest<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("call_id", &self.call_id)
            .field("created_at", &self.created_at)
            .field("executing", &self.executing)
            .finish_non_exhaustive()
    }
}

/// Caller-side handle to a call's eventual result
///
/// Resolves once with the result or with [`QueueError::Cancelled`].
#[must_use = "a pending call does nothing unless awaited"]
pub struct PendingCall<M> {
    call_id: CorrelationId,
    receiver: oneshot::Receiver<QueueResult<CallResult<M>>>,
}

impl<M> PendingCall<M> {
    pub fn call_id(&self) -> &str {
        &self.call_id
    }
}

impl<M> std::fmt::Debug for PendingCall<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("call_id", &self.call_id)
            .finish_non_exhaustive()
    }
}

impl<M> Future for PendingCall<M> {
    type Output = QueueResult<CallResult<M>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // The request was dropped without being fulfilled
            Poll::Ready(Err(_)) => Poll::Ready(Err(QueueError::Cancelled {
                call_id: this.call_id.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A call due for re-publishing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleCall {
    pub call_id: CorrelationId,
    pub serialized_call: String,
}

/// Correlation id to pending request map
pub struct PendingLedger<M> {
    entries: HashMap<CorrelationId, PendingRequest<M>>,
    closed: bool,
}

impl<M> Default for PendingLedger<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> PendingLedger<M> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            closed: false,
        }
    }

    /// Add a request. Fails if its id is already pending or the ledger was closed.
    pub fn insert(&mut self, request: PendingRequest<M>) -> QueueResult<()> {
        if self.closed {
            return Err(QueueError::Stopped);
        }
        if self.entries.contains_key(&request.call_id) {
            return Err(QueueError::DuplicateCallId {
                call_id: request.call_id.clone(),
            });
        }
        self.entries.insert(request.call_id.clone(), request);
        Ok(())
    }

    /// Remove and return the request for `call_id`, if still pending
    pub fn take(&mut self, call_id: &str) -> Option<PendingRequest<M>> {
        self.entries.remove(call_id)
    }

    /// Flag a request as started remotely. Returns false if the id is unknown.
    pub fn mark_executing(&mut self, call_id: &str) -> bool {
        match self.entries.get_mut(call_id) {
            Some(request) => {
                request.executing = true;
                true
            }
            None => false,
        }
    }

    /// Reject every pending request and close the ledger to new inserts.
    ///
    /// Returns the number of requests rejected.
    pub fn reject_all_and_clear(
        &mut self,
        reason: impl Fn(&str) -> QueueError,
    ) -> usize {
        self.closed = true;
        let rejected = self.entries.len();
        for (call_id, request) in self.entries.drain() {
            request.reject(reason(&call_id));
        }
        rejected
    }

    /// Requests that never reported starting and are older than `grace`
    pub fn stale_calls(&self, now: Instant, grace: Duration) -> Vec<StaleCall> {
        self.entries
            .values()
            .filter(|request| {
                !request.executing && now.saturating_duration_since(request.created_at) > grace
            })
            .map(|request| StaleCall {
                call_id: request.call_id.clone(),
                serialized_call: request.serialized_call.clone(),
            })
            .collect()
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.entries.contains_key(call_id)
    }

    pub fn is_executing(&self, call_id: &str) -> Option<bool> {
        self.entries.get(call_id).map(|request| request.executing)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

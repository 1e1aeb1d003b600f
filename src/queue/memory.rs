//! In-memory queue backend
//!
//! A pair of bounded FIFO queues standing in for a real queueing service:
//! calls go to the request queue, results and control messages come back on
//! the response queue. Every message gets a monotonic sequence number
//! starting at 1. Delivery removes a message, except that
//! [`MemoryQueue::duplicate_next_deliveries`] can re-enqueue delivered
//! messages to reproduce at-least-once behaviour, and
//! [`MemoryQueue::fail_next_publishes`] injects publish failures.

use crate::core::sync::handle_mutex_poison;
use crate::queue::backend::{ControlKind, QueueBackend, QueueMessage, ReceivedBatch};
use crate::queue::error::BackendError;
use crate::queue::types::{call_id_attributes, MessageAttributes, CONTROL_ATTRIBUTE};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_RECEIVE_WAIT: Duration = Duration::from_secs(1);

/// A message held by a [`MemoryQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryMessage {
    sequence: u64,
    body: String,
    attributes: MessageAttributes,
}

impl MemoryMessage {
    /// A message not yet assigned a sequence number
    pub fn new(body: impl Into<String>, attributes: MessageAttributes) -> Self {
        Self {
            sequence: 0,
            body: body.into(),
            attributes,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn attributes(&self) -> &MessageAttributes {
        &self.attributes
    }
}

impl QueueMessage for MemoryMessage {
    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn body(&self) -> &str {
        &self.body
    }

    fn is_control(&self, kind: ControlKind) -> bool {
        self.attribute(CONTROL_ATTRIBUTE) == Some(kind.as_ref())
    }
}

/// Bounded FIFO queue with long-poll receive
#[derive(Debug)]
pub struct MemoryQueue {
    queue_id: String,
    max_size: usize,
    next_sequence: AtomicU64,
    messages: Mutex<VecDeque<MemoryMessage>>,
    available: Notify,
    failing_publishes: AtomicUsize,
    duplicate_deliveries: AtomicUsize,
}

impl MemoryQueue {
    pub fn new(queue_id: impl Into<String>, max_size: usize) -> Self {
        Self {
            queue_id: queue_id.into(),
            max_size,
            next_sequence: AtomicU64::new(1),
            messages: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            failing_publishes: AtomicUsize::new(0),
            duplicate_deliveries: AtomicUsize::new(0),
        }
    }

    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    fn messages(
        &self,
        error: impl FnOnce(String) -> BackendError,
    ) -> Result<MutexGuard<'_, VecDeque<MemoryMessage>>, BackendError> {
        handle_mutex_poison(self.messages.lock(), error)
    }

    /// Append a message, returning its sequence number
    pub fn publish(
        &self,
        body: impl Into<String>,
        attributes: MessageAttributes,
    ) -> Result<u64, BackendError> {
        if take_one(&self.failing_publishes) {
            return Err(BackendError::Publish {
                queue: self.queue_id.clone(),
                message: "injected publish failure".to_string(),
            });
        }

        let sequence = {
            let mut messages = self.messages(|message| BackendError::Publish {
                queue: self.queue_id.clone(),
                message,
            })?;
            if messages.len() >= self.max_size {
                return Err(BackendError::QueueFull {
                    queue: self.queue_id.clone(),
                    max_size: self.max_size,
                });
            }
            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            let mut message = MemoryMessage::new(body, attributes);
            message.sequence = sequence;
            messages.push_back(message);
            sequence
        };

        self.available.notify_waiters();
        Ok(sequence)
    }

    /// Remove up to `max` messages without waiting
    pub fn take(&self, max: usize) -> Result<Vec<MemoryMessage>, BackendError> {
        let mut messages = self.messages(|message| BackendError::Receive {
            queue: self.queue_id.clone(),
            message,
        })?;
        let count = max.min(messages.len());
        let batch: Vec<MemoryMessage> = messages.drain(..count).collect();
        for message in &batch {
            if take_one(&self.duplicate_deliveries) {
                messages.push_back(message.clone());
            }
        }
        Ok(batch)
    }

    /// Remove up to `max` messages, waiting up to `wait` for the first one
    pub async fn receive(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<MemoryMessage>, BackendError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.take(max)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(batch);
            }
        }
    }

    pub fn size(&self) -> usize {
        crate::core::sync::lock_recovering(&self.messages).len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Remove and return everything queued
    pub fn drain(&self) -> Vec<MemoryMessage> {
        crate::core::sync::lock_recovering(&self.messages)
            .drain(..)
            .collect()
    }

    /// Make the next `count` publishes fail
    pub fn fail_next_publishes(&self, count: usize) {
        self.failing_publishes.store(count, Ordering::Relaxed);
    }

    /// Deliver each of the next `count` taken messages a second time
    pub fn duplicate_next_deliveries(&self, count: usize) {
        self.duplicate_deliveries.store(count, Ordering::Relaxed);
    }
}

// Decrement a fault-injection counter, reporting whether it was positive
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        .is_ok()
}

/// [`QueueBackend`] over a request and a response [`MemoryQueue`]
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    name: String,
    requests: Arc<MemoryQueue>,
    responses: Arc<MemoryQueue>,
    batch_size: usize,
    receive_wait: Duration,
}

impl MemoryBackend {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_MAX_QUEUE_SIZE)
    }

    pub fn with_capacity(name: impl Into<String>, max_size: usize) -> Self {
        let name = name.into();
        Self {
            requests: Arc::new(MemoryQueue::new(format!("{}-requests", name), max_size)),
            responses: Arc::new(MemoryQueue::new(format!("{}-responses", name), max_size)),
            name,
            batch_size: DEFAULT_BATCH_SIZE,
            receive_wait: DEFAULT_RECEIVE_WAIT,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_receive_wait(mut self, receive_wait: Duration) -> Self {
        self.receive_wait = receive_wait;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requests(&self) -> &Arc<MemoryQueue> {
        &self.requests
    }

    pub fn responses(&self) -> &Arc<MemoryQueue> {
        &self.responses
    }

    /// Identifier callers pass as the response destination
    pub fn response_queue_id(&self) -> &str {
        self.responses.queue_id()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Publish a result body for `call_id` on the response queue
    pub fn respond(&self, call_id: &str, body: impl Into<String>) -> Result<u64, BackendError> {
        self.responses.publish(body, call_id_attributes(call_id))
    }

    /// Report that `call_id` started executing
    pub fn signal_started(&self, call_id: &str) -> Result<u64, BackendError> {
        let mut attributes = ControlKind::FunctionStarted.attributes();
        attributes.extend(call_id_attributes(call_id));
        self.responses.publish(String::new(), attributes)
    }

    /// Take published calls off the request queue
    pub async fn next_calls(
        &self,
        max: usize,
        wait: Duration,
    ) -> Result<Vec<MemoryMessage>, BackendError> {
        self.requests.receive(max, wait).await
    }
}

#[async_trait]
impl QueueBackend for MemoryBackend {
    type Message = MemoryMessage;

    async fn publish_message(
        &self,
        body: String,
        attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError> {
        self.requests
            .publish(body, attributes.unwrap_or_default())
            .map(|_| ())
    }

    async fn receive_messages(&self) -> Result<ReceivedBatch<MemoryMessage>, BackendError> {
        let messages = self
            .responses
            .receive(self.batch_size, self.receive_wait)
            .await?;
        let is_full_batch = messages.len() == self.batch_size;
        Ok(ReceivedBatch {
            messages,
            is_full_batch,
        })
    }

    async fn publish_control_message(
        &self,
        kind: ControlKind,
        attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError> {
        let mut all = attributes.unwrap_or_default();
        all.extend(kind.attributes());
        self.responses.publish(String::new(), all).map(|_| ())
    }

    fn description(&self) -> String {
        format!("memory://{}", self.name)
    }
}

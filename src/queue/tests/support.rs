//! Shared fixtures for queue tests

use crate::queue::api::{
    call_id_attributes, BackendError, ConcurrencyControl, ControlKind, MemoryMessage,
    MessageAttributes, QueueBackend, QueueSettings, ReceivedBatch,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// Backend that replays scripted batches and records everything published
#[derive(Default)]
pub struct ScriptedBackend {
    batches: Mutex<VecDeque<Result<ReceivedBatch<MemoryMessage>, BackendError>>>,
    published: Mutex<Vec<(String, MessageAttributes)>>,
    controls: Mutex<Vec<ControlKind>>,
    receive_calls: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&self, messages: Vec<MemoryMessage>, is_full_batch: bool) {
        self.batches.lock().unwrap().push_back(Ok(ReceivedBatch {
            messages,
            is_full_batch,
        }));
    }

    pub fn push_error(&self, error: BackendError) {
        self.batches.lock().unwrap().push_back(Err(error));
    }

    pub fn published(&self) -> Vec<(String, MessageAttributes)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_ids(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .filter_map(|(_, attributes)| attributes.get("CallId").cloned())
            .collect()
    }

    pub fn controls(&self) -> Vec<ControlKind> {
        self.controls.lock().unwrap().clone()
    }

    pub fn receive_calls(&self) -> usize {
        *self.receive_calls.lock().unwrap()
    }
}

#[async_trait]
impl QueueBackend for ScriptedBackend {
    type Message = MemoryMessage;

    async fn publish_message(
        &self,
        body: String,
        attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError> {
        self.published
            .lock()
            .unwrap()
            .push((body, attributes.unwrap_or_default()));
        Ok(())
    }

    async fn receive_messages(&self) -> Result<ReceivedBatch<MemoryMessage>, BackendError> {
        *self.receive_calls.lock().unwrap() += 1;
        let next = self.batches.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ReceivedBatch::empty()))
    }

    async fn publish_control_message(
        &self,
        kind: ControlKind,
        _attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError> {
        self.controls.lock().unwrap().push(kind);
        Ok(())
    }

    fn description(&self) -> String {
        "scripted://test".to_string()
    }
}

/// Backend whose first publish succeeds and every later one never returns
#[derive(Default)]
pub struct StallingBackend {
    publish_attempts: Mutex<usize>,
}

impl StallingBackend {
    pub fn publish_attempts(&self) -> usize {
        *self.publish_attempts.lock().unwrap()
    }
}

#[async_trait]
impl QueueBackend for StallingBackend {
    type Message = MemoryMessage;

    async fn publish_message(
        &self,
        _body: String,
        _attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError> {
        let attempt = {
            let mut attempts = self.publish_attempts.lock().unwrap();
            *attempts += 1;
            *attempts
        };
        if attempt > 1 {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn receive_messages(&self) -> Result<ReceivedBatch<MemoryMessage>, BackendError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(ReceivedBatch::empty())
    }

    async fn publish_control_message(
        &self,
        _kind: ControlKind,
        _attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn description(&self) -> String {
        "stalling://test".to_string()
    }
}

/// Records every ceiling it is asked to apply
#[derive(Default)]
pub struct RecordingControl {
    applied: Mutex<Vec<usize>>,
}

impl RecordingControl {
    pub fn applied(&self) -> Vec<usize> {
        self.applied.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<usize> {
        self.applied().last().copied()
    }
}

impl ConcurrencyControl for RecordingControl {
    fn set_max_concurrency(&self, max: usize) -> usize {
        self.applied.lock().unwrap().push(max);
        max
    }
}

pub fn result_message(call_id: &str, body: &str) -> MemoryMessage {
    MemoryMessage::new(body, call_id_attributes(call_id))
}

pub fn started_message(call_id: &str) -> MemoryMessage {
    let mut attributes = ControlKind::FunctionStarted.attributes();
    attributes.extend(call_id_attributes(call_id));
    MemoryMessage::new("", attributes)
}

pub fn stop_message() -> MemoryMessage {
    MemoryMessage::new("", ControlKind::StopQueue.attributes())
}

/// Settings with short intervals so tests never wait long
pub fn fast_settings() -> QueueSettings {
    QueueSettings {
        idle_poll_interval: Duration::from_millis(10),
        drain_delay: Duration::from_millis(10),
        ..Default::default()
    }
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

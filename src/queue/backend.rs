//! Queue backend contract
//!
//! The engine never talks to a concrete queueing service. It consumes a
//! [`QueueBackend`]: publish calls, receive result batches, inject control
//! messages. Messages are backend-defined and only need the
//! [`QueueMessage`] capabilities.

use crate::queue::error::BackendError;
use crate::queue::types::{MessageAttributes, CONTROL_ATTRIBUTE};
use async_trait::async_trait;

/// Engine-internal signals carried on the response queue
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ControlKind {
    /// Ask whichever collector receives it to end its tick
    StopQueue,
    /// The remote side has started executing the tagged call
    FunctionStarted,
}

impl ControlKind {
    /// Attributes identifying a control message of this kind
    pub fn attributes(self) -> MessageAttributes {
        MessageAttributes::from([(CONTROL_ATTRIBUTE.to_string(), self.as_ref().to_string())])
    }
}

/// Capabilities the engine needs from a received message
pub trait QueueMessage: Send + Sync + 'static {
    fn attribute(&self, name: &str) -> Option<&str>;

    fn body(&self) -> &str;

    fn is_control(&self, kind: ControlKind) -> bool;
}

/// One batch returned by [`QueueBackend::receive_messages`]
#[derive(Debug, Clone)]
pub struct ReceivedBatch<M> {
    pub messages: Vec<M>,
    /// The batch hit the backend's maximum batch size, i.e. there is a backlog
    pub is_full_batch: bool,
}

impl<M> ReceivedBatch<M> {
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            is_full_batch: false,
        }
    }
}

#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    type Message: QueueMessage;

    /// Publish a serialized call to the request destination
    async fn publish_message(
        &self,
        body: String,
        attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError>;

    /// Receive the next batch from the response queue. May wait for messages.
    async fn receive_messages(&self) -> Result<ReceivedBatch<Self::Message>, BackendError>;

    /// Publish a control message to the response queue
    async fn publish_control_message(
        &self,
        kind: ControlKind,
        attributes: Option<MessageAttributes>,
    ) -> Result<(), BackendError>;

    /// Diagnostic label
    fn description(&self) -> String;
}

//! Queue Error Types

use crate::core::error_handling::ContextualError;

/// Errors surfaced by the queue engine
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("call id '{call_id}' is already pending")]
    DuplicateCallId { call_id: String },

    #[error("call '{call_id}' was cancelled because the queue engine stopped")]
    Cancelled { call_id: String },

    #[error("queue engine has been stopped")]
    Stopped,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl QueueError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueueError::Cancelled { .. })
    }
}

impl ContextualError for QueueError {
    fn is_user_actionable(&self) -> bool {
        match self {
            QueueError::DuplicateCallId { .. } | QueueError::Stopped => true,
            QueueError::Config(e) => e.is_user_actionable(),
            _ => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            QueueError::DuplicateCallId { .. } => {
                Some("correlation ids must be unique among pending calls")
            }
            QueueError::Stopped => {
                Some("the queue engine has been stopped; create a new one to enqueue more calls")
            }
            QueueError::Config(e) => e.user_message(),
            _ => None,
        }
    }
}

/// Errors reported by a queue backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("publish to {queue} failed: {message}")]
    Publish { queue: String, message: String },

    #[error("receive from {queue} failed: {message}")]
    Receive { queue: String, message: String },

    #[error("queue {queue} is full (max size: {max_size})")]
    QueueFull { queue: String, max_size: usize },
}

impl ContextualError for BackendError {
    fn is_user_actionable(&self) -> bool {
        false
    }

    fn user_message(&self) -> Option<&str> {
        None
    }
}

/// Invalid or unreadable configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid setting '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("cannot read configuration file {path}: {message}")]
    Read { path: String, message: String },

    #[error("cannot parse configuration file {path}: {message}")]
    Parse { path: String, message: String },
}

impl ConfigError {
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        true
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { message, .. }
            | ConfigError::Read { message, .. }
            | ConfigError::Parse { message, .. } => Some(message.as_str()),
        }
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

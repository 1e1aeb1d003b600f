//! Executor Error Types

use crate::core::error_handling::ContextualError;
use crate::queue::api::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("function '{name}' is already registered")]
    DuplicateFunction { name: String },

    #[error("malformed call message: {message}")]
    MalformedCall { message: String },

    #[error("cannot encode result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ContextualError for ExecutorError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ExecutorError::DuplicateFunction { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ExecutorError::DuplicateFunction { .. } => Some("function names must be unique"),
            _ => None,
        }
    }
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

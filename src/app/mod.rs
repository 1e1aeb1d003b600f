//! Demo application: wires the in-memory backend, the local executor and
//! the queue engine together behind a small CLI.

use crate::core::error_handling::ContextualError;
use crate::queue::api::{ConfigError, QueueError};

pub mod cli;
pub mod startup;
pub mod summary;

/// Failures that end a demo run
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("cannot start logging: {message}")]
    Logging { message: String },

    #[error("cannot start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl ContextualError for AppError {
    fn is_user_actionable(&self) -> bool {
        match self {
            AppError::Config(e) => e.is_user_actionable(),
            AppError::Queue(e) => e.is_user_actionable(),
            AppError::Logging { .. } => true,
            AppError::Runtime(_) => false,
        }
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Queue(e) => e.user_message(),
            AppError::Logging { message } => Some(message.as_str()),
            AppError::Runtime(_) => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

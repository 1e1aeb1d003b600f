//! Generic error handling utilities
//!
//! Lets the binary report any of the crate's error types with the right
//! amount of detail: caller mistakes and bad configuration are shown as-is,
//! transport and internal failures get a generic context line and the full
//! error at debug level.

/// Trait for errors that can distinguish between user-actionable and system errors
///
/// # Implementation Consistency
/// When `is_user_actionable()` returns `true`, `user_message()` should return
/// `Some(message)`. When it returns `false`, `user_message()` should return `None`.
pub trait ContextualError: std::error::Error {
    /// Returns true if this error carries a message the user can act on
    /// (invalid configuration, duplicate call id, using a stopped engine).
    fn is_user_actionable(&self) -> bool;

    /// Returns the specific user message if this is a user-actionable error
    fn user_message(&self) -> Option<&str>;
}

/// Log errors with appropriate detail level based on error specificity
///
/// # Examples
/// ```rust,no_run
/// # use callqueue::core::error_handling::log_error_with_context;
/// # use callqueue::queue::api::QueueError;
/// let err = QueueError::Stopped;
/// log_error_with_context(&err, "Enqueue call");
/// // Logs: "FATAL: queue engine has been stopped"
/// ```
pub fn log_error_with_context<E: ContextualError + std::fmt::Display + std::fmt::Debug>(
    error: &E,
    operation_context: &str,
) {
    match error.user_message() {
        Some(user_msg) if error.is_user_actionable() => log::error!("FATAL: {}", user_msg),
        _ => log::error!("FATAL: {}", operation_context),
    }
    log::debug!("DETAIL: {}", error);
    log::debug!("DEBUG_DETAILS: {:?}", error);
}

//! Public API for the local executor

pub use crate::executor::error::{ExecutorError, ExecutorResult};
pub use crate::executor::local::{ExecutorOptions, LocalExecutor};
pub use crate::executor::registry::{FunctionRegistry, RemoteFunction};

//! Function Registry
//!
//! Name to async function map used by the local executor. A function takes
//! the call's JSON arguments and returns a JSON value or an error message.

use crate::executor::error::{ExecutorError, ExecutorResult};
use crate::queue::api::{CallEnvelope, ResultBody};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A function callable by name through the queue
pub type RemoteFunction =
    Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value, String>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, RemoteFunction>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with `echo`, `square`, `fail` and `slow`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.functions.insert("echo".to_string(), boxed(echo));
        registry.functions.insert("square".to_string(), boxed(square_fn));
        registry.functions.insert("fail".to_string(), boxed(fail));
        registry.functions.insert("slow".to_string(), boxed(slow));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, function: RemoteFunction) -> ExecutorResult<()> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(ExecutorError::DuplicateFunction { name });
        }
        self.functions.insert(name, function);
        Ok(())
    }

    /// Register an async closure
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, function: F) -> ExecutorResult<()>
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        self.register(name, boxed(function))
    }

    pub fn get(&self, name: &str) -> Option<&RemoteFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Run one call. Failures, including unknown functions, become error results.
    pub async fn execute(&self, envelope: &CallEnvelope, start_time: DateTime<Utc>) -> ResultBody {
        let Some(function) = self.functions.get(&envelope.name) else {
            return ResultBody::failure(
                format!("unknown function '{}'", envelope.name),
                start_time,
            );
        };
        match function(envelope.args.clone()).await {
            Ok(value) => ResultBody::success(value, start_time),
            Err(error) => ResultBody::failure(error, start_time),
        }
    }
}

fn boxed<F, Fut>(function: F) -> RemoteFunction
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    Arc::new(move |args| -> BoxFuture<'static, Result<Value, String>> {
        Box::pin(function(args))
    })
}

async fn echo(args: Value) -> Result<Value, String> {
    Ok(args)
}

async fn square_fn(args: Value) -> Result<Value, String> {
    square(&args)
}

async fn fail(args: Value) -> Result<Value, String> {
    Err(args.as_str().unwrap_or("requested failure").to_string())
}

/// Sleeps for `args.ms` milliseconds (default 100), then echoes
async fn slow(args: Value) -> Result<Value, String> {
    let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(100);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(args)
}

// Accepts a bare number or a one-element array
fn square(args: &Value) -> Result<Value, String> {
    let n = match args {
        Value::Array(items) if items.len() == 1 => &items[0],
        other => other,
    };
    if let Some(i) = n.as_i64() {
        return i
            .checked_mul(i)
            .map(|sq| json!(sq))
            .ok_or_else(|| format!("square of {} overflows", i));
    }
    n.as_f64()
        .map(|f| json!(f * f))
        .ok_or_else(|| format!("square expects a number, got {}", args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::api::CallRequest;

    fn envelope(name: &str, args: Value) -> CallEnvelope {
        CallEnvelope::new(&CallRequest::new("c1", name, args), "responses")
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["echo", "fail", "slow", "square"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = FunctionRegistry::with_builtins();
        let err = registry
            .register_fn("echo", |args| async move { Ok::<Value, String>(args) })
            .unwrap_err();
        assert!(matches!(err, ExecutorError::DuplicateFunction { ref name } if name == "echo"));
    }

    #[tokio::test]
    async fn test_execute_success_stamps_times() {
        let registry = FunctionRegistry::with_builtins();
        let start = Utc::now();
        let result = registry.execute(&envelope("square", json!([7])), start).await;

        assert_eq!(result.value, Some(json!(49)));
        assert_eq!(result.error, None);
        assert_eq!(result.remote_execution_start_time, Some(start));
        assert!(result.remote_execution_end_time >= start);
    }

    #[tokio::test]
    async fn test_execute_reports_function_errors() {
        let registry = FunctionRegistry::with_builtins();
        let result = registry.execute(&envelope("fail", json!("boom")), Utc::now()).await;
        assert_eq!(result.error.as_deref(), Some("boom"));

        let result = registry
            .execute(&envelope("square", json!("four")), Utc::now())
            .await;
        assert!(result.error.unwrap().contains("expects a number"));
    }

    #[tokio::test]
    async fn test_unknown_function_is_an_error_result() {
        let registry = FunctionRegistry::new();
        assert!(registry.is_empty());
        let result = registry.execute(&envelope("nope", Value::Null), Utc::now()).await;
        assert_eq!(result.error.as_deref(), Some("unknown function 'nope'"));
    }

    #[tokio::test]
    async fn test_custom_function() {
        let mut registry = FunctionRegistry::new();
        registry
            .register_fn("len", |args| async move {
                args.as_str()
                    .map(|s| json!(s.len()))
                    .ok_or_else(|| "expected a string".to_string())
            })
            .unwrap();
        assert!(registry.contains("len"));

        let result = registry.execute(&envelope("len", json!("abcd")), Utc::now()).await;
        assert_eq!(result.value, Some(json!(4)));
    }

    #[test]
    fn test_square_handles_floats_and_overflow() {
        assert_eq!(square(&json!(1.5)).unwrap(), json!(2.25));
        assert!(square(&json!(i64::MAX)).is_err());
    }
}

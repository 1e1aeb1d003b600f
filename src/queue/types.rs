//! Wire and result types for the queue engine
//!
//! A call travels to the remote side as a JSON [`CallEnvelope`]; the remote
//! side answers with a JSON [`ResultBody`] tagged with the call's correlation
//! id. The engine hands callers a [`CallResult`] carrying the decoded payload
//! and the raw backend message it arrived in.

use crate::core::logging::DiagnosticSink;
use crate::queue::backend::QueueMessage;
use crate::queue::error::QueueResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Caller-assigned identifier linking a call to its result message
pub type CorrelationId = String;

/// Message attributes as published to a backend
pub type MessageAttributes = HashMap<String, String>;

/// Attribute carrying the correlation id on call, result and control messages
pub const CALL_ID_ATTRIBUTE: &str = "CallId";

/// Attribute naming the control kind on control messages
pub const CONTROL_ATTRIBUTE: &str = "cmd";

/// Attributes carrying only a correlation id
pub fn call_id_attributes(call_id: &str) -> MessageAttributes {
    HashMap::from([(CALL_ID_ATTRIBUTE.to_string(), call_id.to_string())])
}

/// A call to be executed remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    pub call_id: CorrelationId,
    pub name: String,
    pub args: Value,
}

impl CallRequest {
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, args: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            args,
        }
    }
}

/// Serialized form of a call: the request plus where its result must be sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    pub call_id: CorrelationId,
    pub name: String,
    pub args: Value,
    pub response_queue_id: String,
    #[serde(default)]
    pub wire_version: u32,
}

impl CallEnvelope {
    pub fn new(call: &CallRequest, response_queue_id: &str) -> Self {
        Self {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            args: call.args.clone(),
            response_queue_id: response_queue_id.to_string(),
            wire_version: crate::core::version::wire_format_version(),
        }
    }

    pub fn to_body(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_body(body: &str) -> QueueResult<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Outcome of one remote execution, as published by the remote side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_execution_start_time: Option<DateTime<Utc>>,
    pub remote_execution_end_time: DateTime<Utc>,
}

impl ResultBody {
    pub fn success(value: Value, start_time: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            error: None,
            remote_execution_start_time: Some(start_time),
            remote_execution_end_time: Utc::now(),
        }
    }

    pub fn failure(error: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            value: None,
            error: Some(error.into()),
            remote_execution_start_time: Some(start_time),
            remote_execution_end_time: Utc::now(),
        }
    }

    pub fn to_body(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Result delivered to a caller: the decoded payload plus the raw message
#[derive(Debug, Clone)]
pub struct CallResult<M> {
    pub payload: Value,
    pub message: M,
}

impl<M: QueueMessage> CallResult<M> {
    /// Decode a result message.
    ///
    /// A body that is not JSON is kept as a JSON string so the call still
    /// resolves; the caller sees exactly what arrived.
    pub fn from_message(message: M, sink: &dyn DiagnosticSink) -> Self {
        let payload = match serde_json::from_str::<Value>(message.body()) {
            Ok(payload) => payload,
            Err(e) => {
                crate::diag!(
                    sink,
                    log::Level::Warn,
                    "Result body for call {} is not JSON ({}); delivering it as a string",
                    message.attribute(CALL_ID_ATTRIBUTE).unwrap_or("?"),
                    e
                );
                Value::String(message.body().to_string())
            }
        };
        Self { payload, message }
    }
}

impl<M> CallResult<M> {
    pub fn value(&self) -> Option<&Value> {
        self.payload.get("value")
    }

    pub fn error(&self) -> Option<&str> {
        self.payload.get("error").and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }

    pub fn remote_execution_end_time(&self) -> Option<DateTime<Utc>> {
        self.payload
            .get("remoteExecutionEndTime")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }

    /// The payload as a typed [`ResultBody`], if it has that shape
    pub fn body(&self) -> Option<ResultBody> {
        serde_json::from_value(self.payload.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_uses_camel_case_keys() {
        let call = CallRequest::new("c1", "square", json!([4]));
        let body = CallEnvelope::new(&call, "responses-1").to_body().unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(parsed["callId"], "c1");
        assert_eq!(parsed["name"], "square");
        assert_eq!(parsed["args"], json!([4]));
        assert_eq!(parsed["responseQueueId"], "responses-1");
        assert!(parsed["wireVersion"].as_u64().unwrap() > 0);
    }

    #[test]
    fn test_envelope_accepts_missing_wire_version() {
        let envelope = CallEnvelope::from_body(
            r#"{"callId":"c2","name":"echo","args":null,"responseQueueId":"r"}"#,
        )
        .unwrap();
        assert_eq!(envelope.call_id, "c2");
        assert_eq!(envelope.wire_version, 0);
    }

    #[test]
    fn test_result_body_omits_empty_fields() {
        let body = ResultBody::success(json!(16), Utc::now()).to_body().unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();

        assert_eq!(parsed["value"], 16);
        assert!(parsed.get("error").is_none());
        assert!(parsed["remoteExecutionEndTime"].is_string());
    }

    #[test]
    fn test_call_result_accessors() {
        let end = Utc::now();
        let payload = serde_json::to_value(ResultBody {
            value: None,
            error: Some("boom".to_string()),
            remote_execution_start_time: None,
            remote_execution_end_time: end,
        })
        .unwrap();
        let result = CallResult {
            payload,
            message: (),
        };

        assert!(result.is_error());
        assert_eq!(result.error(), Some("boom"));
        assert_eq!(result.value(), None);
        assert_eq!(
            result.remote_execution_end_time().map(|t| t.timestamp_millis()),
            Some(end.timestamp_millis())
        );
        assert_eq!(result.body().unwrap().error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_arbitrary_payload_is_kept_verbatim() {
        let result = CallResult {
            payload: json!({"ok": true}),
            message: (),
        };
        assert_eq!(result.payload, json!({"ok": true}));
        assert!(!result.is_error());
        assert!(result.body().is_none());
    }
}

//! JSON-RPC 2.0 framing for the MCP endpoint.
//!
//! Incoming bodies are parsed into a [`RequestEnvelope`] in two steps: first
//! as arbitrary JSON (a failure here is a parse error), then field by field,
//! so that a malformed envelope still reports the caller's `id` back in the
//! `Invalid Request` error.

use rmcp::model::{ErrorCode, JsonObject};
use serde::Serialize;
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Error codes used on the wire.
///
/// The standard JSON-RPC codes come from `rmcp`; the two server-defined codes
/// sit in the implementation-reserved `-32000..-32099` range.
pub mod codes {
    use rmcp::model::ErrorCode;

    pub const PARSE_ERROR: ErrorCode = ErrorCode::PARSE_ERROR;
    pub const INVALID_REQUEST: ErrorCode = ErrorCode::INVALID_REQUEST;
    pub const METHOD_NOT_FOUND: ErrorCode = ErrorCode::METHOD_NOT_FOUND;
    pub const INTERNAL_ERROR: ErrorCode = ErrorCode::INTERNAL_ERROR;
    /// No session header, or the session it names is unknown.
    pub const NO_VALID_SESSION: ErrorCode = ErrorCode(-32000);
    /// Missing or unusable bearer token.
    pub const UNAUTHORIZED: ErrorCode = ErrorCode(-32001);
}

/// A framed JSON-RPC request or notification.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub method: String,
    /// Always an object; an absent or `null` `params` becomes `{}`.
    pub params: Value,
    /// `None` when the envelope is a notification.
    pub id: Option<Value>,
}

impl RequestEnvelope {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// The id to echo in a response; notifications answer with `null`.
    pub fn response_id(&self) -> Value {
        self.id.clone().unwrap_or(Value::Null)
    }
}

/// Why a body could not be framed as a JSON-RPC request.
#[derive(Debug, Clone, PartialEq)]
pub enum FramingError {
    /// Body is not JSON at all.
    Parse,
    /// Body is JSON but not a valid request envelope. Carries whatever id
    /// could be recovered.
    InvalidRequest { id: Value },
}

impl FramingError {
    pub fn into_response(self) -> JsonRpcResponse {
        match self {
            FramingError::Parse => {
                JsonRpcResponse::error(Value::Null, codes::PARSE_ERROR, "Parse error")
            }
            FramingError::InvalidRequest { id } => {
                JsonRpcResponse::error(id, codes::INVALID_REQUEST, "Invalid Request")
            }
        }
    }
}

/// Parses a raw request body into an envelope.
pub fn parse_envelope(body: &[u8]) -> Result<RequestEnvelope, FramingError> {
    let value: Value = serde_json::from_slice(body).map_err(|_| FramingError::Parse)?;

    // Batches are not supported; arrays and scalars are invalid requests.
    let Value::Object(mut object) = value else {
        return Err(FramingError::InvalidRequest { id: Value::Null });
    };

    let id = match object.remove("id") {
        None | Some(Value::Null) => None,
        Some(id) => Some(id),
    };
    let reported_id = id.clone().unwrap_or(Value::Null);

    if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err(FramingError::InvalidRequest { id: reported_id });
    }

    let Some(Value::String(method)) = object.remove("method") else {
        return Err(FramingError::InvalidRequest { id: reported_id });
    };

    let params = match object.remove("params") {
        None | Some(Value::Null) => Value::Object(JsonObject::new()),
        Some(params) => params,
    };

    Ok(RequestEnvelope { method, params, id })
}

/// Best-effort recovery of a request id from a body that was never framed,
/// used when a request is rejected before parsing.
pub fn peek_request_id(body: &[u8]) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("id").cloned())
        .unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: ErrorCode,
    pub message: String,
}

/// Outgoing JSON-RPC envelope. Exactly one of `result` and `error` is set,
/// and `id` is always serialized (as `null` when unknown).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Value, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn non_json_is_a_parse_error() {
        assert_eq!(parse_envelope(b"not json").unwrap_err(), FramingError::Parse);
    }

    #[test]
    fn wrong_version_keeps_the_id() {
        let body = json!({"jsonrpc": "1.0", "method": "tools/list", "id": 7});
        let err = parse_envelope(body.to_string().as_bytes()).unwrap_err();
        assert_eq!(err, FramingError::InvalidRequest { id: json!(7) });
    }

    #[test]
    fn batch_is_rejected() {
        let err = parse_envelope(b"[]").unwrap_err();
        assert_eq!(err, FramingError::InvalidRequest { id: Value::Null });
    }

    #[test]
    fn null_id_marks_a_notification_and_params_default_to_object() {
        let body = json!({"jsonrpc": "2.0", "method": "notifications/initialized", "id": null});
        let envelope = parse_envelope(body.to_string().as_bytes()).unwrap();
        assert!(envelope.is_notification());
        assert_eq!(envelope.params, json!({}));
    }

    #[test]
    fn error_envelope_serializes_id_and_code() {
        let resp = JsonRpcResponse::error(Value::Null, codes::UNAUTHORIZED, "Unauthorized");
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            v,
            json!({"jsonrpc": "2.0", "error": {"code": -32001, "message": "Unauthorized"}, "id": null})
        );
    }
}

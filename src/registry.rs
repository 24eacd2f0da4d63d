//! Method registry: maps JSON-RPC method names to typed handlers.
//!
//! `initialize` is special-cased by the dispatcher because it creates the
//! session; the registry only validates its params and shapes its result.
//! Everything else that carries an id runs against an existing session.

use actix_web::http::StatusCode;
use rmcp::model::{ErrorCode, JsonObject, Tool};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::protocol::codes;
use crate::session::Session;
use crate::tools::{ToolError, ToolTable};

/// Protocol version assumed when a client's `initialize` omits one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// A recognized method name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method<'a> {
    Initialize,
    Initialized,
    ListTools,
    CallTool,
    Unknown(&'a str),
}

impl<'a> Method<'a> {
    pub fn parse(name: &'a str) -> Self {
        match name {
            "initialize" => Method::Initialize,
            "notifications/initialized" => Method::Initialized,
            "tools/list" => Method::ListTools,
            "tools/call" => Method::CallTool,
            other => Method::Unknown(other),
        }
    }

    /// Whether a request for this method must name a live session.
    pub fn requires_session(&self) -> bool {
        !matches!(self, Method::Initialize | Method::Initialized)
    }
}

#[derive(Debug, Error)]
pub enum MethodError {
    #[error("Method not found: {0}")]
    NotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(#[from] serde_json::Error),
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl MethodError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MethodError::NotFound(_) => codes::METHOD_NOT_FOUND,
            MethodError::InvalidParams(_) | MethodError::Tool(_) => codes::INTERNAL_ERROR,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            MethodError::NotFound(_) => StatusCode::BAD_REQUEST,
            MethodError::InvalidParams(_) | MethodError::Tool(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message placed in the JSON-RPC error object.
    pub fn message(&self) -> String {
        match self {
            MethodError::NotFound(_) => self.to_string(),
            _ => format!("Internal error: {self}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Option<JsonObject>,
    #[serde(default)]
    pub client_info: Option<JsonObject>,
}

fn default_protocol_version() -> String {
    DEFAULT_PROTOCOL_VERSION.to_string()
}

/// Capabilities advertised back to the client. Each entry is present exactly
/// when the client declared the same top-level capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<JsonObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompts: Option<JsonObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<JsonObject>,
}

impl ServerCapabilities {
    pub fn mirror(client: &JsonObject) -> Self {
        let declared = |key: &str| {
            matches!(client.get(key), Some(v) if !v.is_null() && *v != Value::Bool(false))
                .then(JsonObject::new)
        };
        Self {
            tools: declared("tools"),
            prompts: declared("prompts"),
            resources: declared("resources"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListToolsResult {
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<JsonObject>,
}

/// The validated outcome of `initialize` params: what to store and what to
/// answer. Nothing is stored until the dispatcher creates the session.
#[derive(Debug, Clone)]
pub struct Negotiated {
    pub protocol_version: String,
    pub capabilities: JsonObject,
    pub client_info: JsonObject,
    pub result: InitializeResult,
}

#[derive(Debug, Default)]
pub struct MethodRegistry {
    tools: ToolTable,
    server_info: ServerInfo,
}

impl MethodRegistry {
    pub fn new(tools: ToolTable, server_info: ServerInfo) -> Self {
        Self { tools, server_info }
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.tools.descriptors()
    }

    pub fn negotiate(&self, params: Value) -> Result<Negotiated, MethodError> {
        let params: InitializeParams = serde_json::from_value(params)?;
        let capabilities = params.capabilities.unwrap_or_default();
        let result = InitializeResult {
            protocol_version: params.protocol_version.clone(),
            capabilities: ServerCapabilities::mirror(&capabilities),
            server_info: self.server_info.clone(),
        };
        Ok(Negotiated {
            protocol_version: params.protocol_version,
            capabilities,
            client_info: params.client_info.unwrap_or_default(),
            result,
        })
    }

    /// Runs a session-bound method and returns its JSON result.
    pub fn invoke(
        &self,
        method: Method<'_>,
        params: Value,
        session: &Session,
    ) -> Result<Value, MethodError> {
        match method {
            Method::ListTools => {
                tracing::info!(session_id = %session.id, "tools/list");
                let result = ListToolsResult {
                    tools: self.tools(),
                };
                tracing::info!(count = result.tools.len(), "Returning tools");
                Ok(serde_json::to_value(result)?)
            }
            Method::CallTool => {
                let params: CallToolParams = serde_json::from_value(params)?;
                let arguments = params.arguments.unwrap_or_default();
                let logged_arguments = Value::Object(arguments.clone());
                tracing::info!(
                    session_id = %session.id,
                    tool = %params.name,
                    arguments = %logged_arguments,
                    "tools/call"
                );
                let result = self.tools.call(&params.name, &arguments)?;
                let result = serde_json::to_value(result)?;
                tracing::info!(tool = %params.name, %result, "Tool execution result");
                Ok(result)
            }
            Method::Initialize | Method::Initialized | Method::Unknown(_) => {
                tracing::warn!(method = ?method, "Unknown method");
                Err(MethodError::NotFound(method_name(method).to_string()))
            }
        }
    }
}

fn method_name(method: Method<'_>) -> &str {
    match method {
        Method::Initialize => "initialize",
        Method::Initialized => "notifications/initialized",
        Method::ListTools => "tools/list",
        Method::CallTool => "tools/call",
        Method::Unknown(name) => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        Session {
            id: "s-1".into(),
            protocol_version: DEFAULT_PROTOCOL_VERSION.into(),
            capabilities: JsonObject::new(),
            client_info: JsonObject::new(),
            initialized: true,
        }
    }

    #[test]
    fn parse_recognizes_methods() {
        assert_eq!(Method::parse("initialize"), Method::Initialize);
        assert_eq!(Method::parse("tools/call"), Method::CallTool);
        assert_eq!(Method::parse("prompts/list"), Method::Unknown("prompts/list"));
        assert!(Method::parse("tools/list").requires_session());
        assert!(!Method::parse("initialize").requires_session());
    }

    #[test]
    fn negotiate_echoes_version_and_mirrors_capabilities() {
        let registry = MethodRegistry::default();
        let negotiated = registry
            .negotiate(json!({
                "protocolVersion": "2025-06-18",
                "capabilities": {"tools": {"listChanged": true}, "sampling": {}},
                "clientInfo": {"name": "vscode", "version": "1.0"}
            }))
            .unwrap();

        let result = serde_json::to_value(&negotiated.result).unwrap();
        assert_eq!(result["protocolVersion"], "2025-06-18");
        assert_eq!(result["capabilities"], json!({"tools": {}}));
        assert_eq!(negotiated.client_info["name"], "vscode");
    }

    #[test]
    fn negotiate_defaults_protocol_version() {
        let registry = MethodRegistry::default();
        let negotiated = registry.negotiate(json!({})).unwrap();
        assert_eq!(negotiated.protocol_version, DEFAULT_PROTOCOL_VERSION);
        assert_eq!(negotiated.result.capabilities, ServerCapabilities::default());
    }

    #[test]
    fn negotiate_rejects_non_object_params() {
        let registry = MethodRegistry::default();
        let err = registry.negotiate(json!([1, 2])).unwrap_err();
        assert_eq!(err.code().0, -32603);
    }

    #[test]
    fn unknown_method_maps_to_method_not_found() {
        let registry = MethodRegistry::default();
        let err = registry
            .invoke(Method::parse("resources/list"), json!({}), &session())
            .unwrap_err();
        assert_eq!(err.code().0, -32601);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.message(), "Method not found: resources/list");
    }

    #[test]
    fn unknown_tool_is_an_internal_error() {
        let registry = MethodRegistry::default();
        let err = registry
            .invoke(Method::CallTool, json!({"name": "divide"}), &session())
            .unwrap_err();
        assert_eq!(err.code().0, -32603);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), "Internal error: Unknown tool: divide");
    }

    #[test]
    fn call_tool_returns_text_content() {
        let registry = MethodRegistry::default();
        let result = registry
            .invoke(
                Method::CallTool,
                json!({"name": "add", "arguments": {"a": 2, "b": 3}}),
                &session(),
            )
            .unwrap();
        assert_eq!(result["content"][0]["type"], "text");
        assert_eq!(result["content"][0]["text"], "2 + 3 = 5");
    }
}

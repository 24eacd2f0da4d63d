//! Per-request JSON-RPC state machine.
//!
//! A request that has already passed the bearer gate goes through:
//!
//! 1. framing ([`parse_envelope`]): parse error or invalid request ends here;
//! 2. notifications (no `id`) are acknowledged without touching sessions;
//! 3. `initialize` creates a session and returns its id out of band;
//! 4. anything else must name a live session, then runs in the registry.
//!
//! The [`Dispatcher`] knows nothing about HTTP beyond the status code it
//! suggests; the transport turns an [`Outcome`] into a response.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use actix_web::http::StatusCode;
use futures::FutureExt;
use serde_json::Value;

use crate::protocol::{JsonRpcResponse, RequestEnvelope, codes, parse_envelope};
use crate::registry::{Method, MethodRegistry};
use crate::session::{SessionId, SessionStore};

const NO_VALID_SESSION: &str = "Server error: No valid session. Call initialize first.";

#[derive(Debug, Clone)]
pub enum OutcomeBody {
    /// A JSON-RPC response envelope.
    Envelope(JsonRpcResponse),
    /// Empty acknowledgment of a notification.
    Ack,
}

/// What the transport should send back.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: StatusCode,
    pub body: OutcomeBody,
    /// Session id to place in the response header, if any.
    pub session_id: Option<SessionId>,
}

impl Outcome {
    fn reply(status: StatusCode, response: JsonRpcResponse, session_id: Option<SessionId>) -> Self {
        Self {
            status,
            body: OutcomeBody::Envelope(response),
            session_id,
        }
    }

    fn ack() -> Self {
        Self {
            status: StatusCode::OK,
            body: OutcomeBody::Ack,
            session_id: None,
        }
    }

    /// The response envelope, if this outcome carries one.
    pub fn envelope(&self) -> Option<&JsonRpcResponse> {
        match &self.body {
            OutcomeBody::Envelope(r) => Some(r),
            OutcomeBody::Ack => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<SessionStore>,
    registry: Arc<MethodRegistry>,
}

impl Dispatcher {
    pub fn new(store: Arc<SessionStore>, registry: Arc<MethodRegistry>) -> Self {
        Self { store, registry }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handles one POSTed body. `session_header` is the raw `mcp-session-id`
    /// request header.
    pub async fn dispatch(&self, session_header: Option<&str>, body: &[u8]) -> Outcome {
        let envelope = match parse_envelope(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(error = ?e, "Rejecting unframed request");
                return Outcome::reply(StatusCode::BAD_REQUEST, e.into_response(), None);
            }
        };

        tracing::info!(method = %envelope.method, id = %envelope.response_id(), "Incoming request");

        let id = envelope.response_id();
        let session_header = session_header.map(str::to_owned);
        let run = AssertUnwindSafe(self.route(session_header, envelope)).catch_unwind();

        match run.await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                tracing::error!(%detail, "Method handler panicked");
                Outcome::reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    JsonRpcResponse::error(
                        id,
                        codes::INTERNAL_ERROR,
                        format!("Internal error: {detail}"),
                    ),
                    None,
                )
            }
        }
    }

    async fn route(&self, session_header: Option<String>, envelope: RequestEnvelope) -> Outcome {
        let method = Method::parse(&envelope.method);

        if envelope.is_notification() {
            match method {
                Method::Initialized => {
                    tracing::info!("notifications/initialized received");
                }
                _ => tracing::warn!(method = %envelope.method, "Unknown notification"),
            }
            return Outcome::ack();
        }

        let id = envelope.response_id();

        if method == Method::Initialize {
            return self.initialize(id, envelope.params).await;
        }

        let session = match session_header.as_deref() {
            Some(sid) => self.store.lookup(sid).await,
            None => None,
        };
        let Some(session) = session else {
            tracing::warn!(
                session_id = ?session_header,
                method = %envelope.method,
                "Request without a valid session"
            );
            return Outcome::reply(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(id, codes::NO_VALID_SESSION, NO_VALID_SESSION),
                None,
            );
        };

        match self.registry.invoke(method, envelope.params, &session) {
            Ok(result) => Outcome::reply(
                StatusCode::OK,
                JsonRpcResponse::success(id, result),
                Some(session.id),
            ),
            Err(e) => {
                tracing::warn!(session_id = %session.id, error = %e, "Method failed");
                Outcome::reply(
                    e.status(),
                    JsonRpcResponse::error(id, e.code(), e.message()),
                    None,
                )
            }
        }
    }

    async fn initialize(&self, id: Value, params: Value) -> Outcome {
        tracing::info!(%params, "initialize called");

        let negotiated = match self.registry.negotiate(params) {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "initialize rejected");
                return Outcome::reply(
                    e.status(),
                    JsonRpcResponse::error(id, e.code(), e.message()),
                    None,
                );
            }
        };

        let result = match serde_json::to_value(&negotiated.result) {
            Ok(result) => result,
            Err(e) => {
                return Outcome::reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    JsonRpcResponse::error(
                        id,
                        codes::INTERNAL_ERROR,
                        format!("Internal error: {e}"),
                    ),
                    None,
                );
            }
        };

        let session_id = self
            .store
            .create(
                negotiated.protocol_version,
                negotiated.capabilities,
                negotiated.client_info,
            )
            .await;

        tracing::info!(%session_id, %result, "Initialize successful");

        Outcome::reply(
            StatusCode::OK,
            JsonRpcResponse::success(id, result),
            Some(session_id),
        )
    }
}

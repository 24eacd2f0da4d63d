//! actix-web service exposing the MCP endpoint and the OAuth discovery routes.
//!
//! ## Session Management
//!
//! Sessions live in a [`SessionStore`] shared by every worker. `POST /` with
//! `initialize` creates one and returns its id in the `mcp-session-id` response
//! header; `DELETE /` with that header removes it.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use actix_web::{App, HttpServer};
//! use mcp_bearer_server::{SessionStore, transport::McpHttpService};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let service = McpHttpService::builder()
//!         .session_store(Arc::new(SessionStore::with_capacity_limit(1024)))
//!         .auth_server("https://auth.example.com")
//!         .server_url("https://mcp.example.com")
//!         .build();
//!
//!     HttpServer::new(move || App::new().configure(service.clone().configure()))
//!         .bind("0.0.0.0:3000")?
//!         .run()
//!         .await
//! }
//! ```

use std::sync::Arc;

use actix_web::{
    HttpRequest, HttpResponse,
    http::header::{self, ACCESS_CONTROL_ALLOW_ORIGIN},
    middleware,
    web::{self, Bytes, Data},
};
use serde_json::json;

use super::HEADER_SESSION_ID;
use super::bearer::{bearer_gate, request_claims};
use crate::auth::BearerGate;
use crate::discovery::{
    PROTECTED_RESOURCE_PATH, ProtectedResourceMetadata, RESOURCE_METADATA_ALIAS_PATH,
    resource_metadata_url,
};
use crate::dispatch::{Dispatcher, Outcome, OutcomeBody};
use crate::registry::MethodRegistry;
use crate::session::SessionStore;

pub const HEALTH_PATH: &str = "/health";

/// The MCP HTTP service.
///
/// Cheap to clone: all state is behind `Arc`s, so clones handed to each
/// actix worker share one session store.
///
/// # Example
///
/// ```rust,no_run
/// use actix_web::{App, HttpServer, web};
/// use mcp_bearer_server::transport::McpHttpService;
///
/// #[actix_web::main]
/// async fn main() -> std::io::Result<()> {
///     let service = McpHttpService::builder()
///         .auth_server("http://localhost:8090")
///         .server_url("http://localhost:3000")
///         .jwks_uri("http://localhost:8090/oauth2/jwks")
///         .build();
///
///     HttpServer::new(move || {
///         App::new().service(web::scope("/mcp").configure(service.clone().configure()))
///     })
///     .bind("127.0.0.1:3000")?
///     .run()
///     .await
/// }
/// ```
#[derive(Clone, bon::Builder)]
pub struct McpHttpService {
    /// Sessions shared across all workers
    #[builder(default)]
    session_store: Arc<SessionStore>,

    /// Method handlers and the tool table
    #[builder(default)]
    registry: Arc<MethodRegistry>,

    /// Authorization check for the protected routes
    #[builder(default)]
    gate: Arc<BearerGate>,

    /// Authorization server advertised in the resource metadata
    #[builder(into)]
    auth_server: String,

    /// Public URL of this server
    #[builder(into)]
    server_url: String,

    /// JWKS location discovered at startup, reported by the health check
    #[builder(into)]
    jwks_uri: Option<String>,
}

/// Per-application state used by the handlers and the bearer middleware.
#[derive(Clone)]
pub(crate) struct AppData {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) gate: Arc<BearerGate>,
    pub(crate) resource_metadata: ProtectedResourceMetadata,
    pub(crate) resource_metadata_url: String,
    pub(crate) auth_server: String,
    pub(crate) server_url: String,
    pub(crate) jwks_uri: Option<String>,
}

impl AppData {
    fn store(&self) -> &SessionStore {
        self.dispatcher.store()
    }
}

impl McpHttpService {
    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.session_store
    }

    /// Returns a configuration closure registering every route of this
    /// service, for `App::configure` or `Scope::configure`.
    pub fn configure(self) -> impl FnOnce(&mut web::ServiceConfig) {
        let app_data = AppData {
            dispatcher: Dispatcher::new(self.session_store, self.registry),
            gate: self.gate,
            resource_metadata: ProtectedResourceMetadata::new(
                self.server_url.clone(),
                self.auth_server.clone(),
            ),
            resource_metadata_url: resource_metadata_url(&self.server_url),
            auth_server: self.auth_server,
            server_url: self.server_url,
            jwks_uri: self.jwks_uri,
        };

        move |cfg: &mut web::ServiceConfig| {
            cfg.app_data(Data::new(app_data))
                .service(
                    web::resource(PROTECTED_RESOURCE_PATH)
                        .route(web::get().to(handle_resource_metadata)),
                )
                .service(
                    web::resource(RESOURCE_METADATA_ALIAS_PATH)
                        .route(web::get().to(handle_resource_metadata)),
                )
                .service(web::resource(HEALTH_PATH).route(web::get().to(handle_health)))
                .service(
                    web::resource("/")
                        .wrap(middleware::from_fn(bearer_gate))
                        .route(web::post().to(handle_post))
                        .route(web::get().to(handle_get))
                        .route(web::delete().to(handle_delete)),
                );
        }
    }
}

async fn handle_post(req: HttpRequest, body: Bytes, service: Data<AppData>) -> HttpResponse {
    let session_id = session_header(&req);

    if let Some(claims) = request_claims(&req) {
        tracing::debug!(subject = ?claims.subject(), ?session_id, "POST request");
    }

    let outcome = service.dispatcher.dispatch(session_id, &body).await;
    outcome_response(outcome)
}

async fn handle_get(req: HttpRequest, service: Data<AppData>) -> HttpResponse {
    let session_id = session_header(&req);
    tracing::debug!(?session_id, "GET request for session status");

    let active = match session_id {
        Some(sid) => service.store().contains(sid).await,
        None => false,
    };

    let mut response = HttpResponse::Ok();
    if let Some(sid) = session_id {
        response.insert_header((HEADER_SESSION_ID, sid));
    }
    response.json(json!({
        "status": "ok",
        "session_id": session_id,
        "active": active,
    }))
}

async fn handle_delete(req: HttpRequest, service: Data<AppData>) -> HttpResponse {
    let Some(session_id) = session_header(&req) else {
        tracing::debug!("DELETE request without session id");
        return HttpResponse::NotFound().finish();
    };

    if service.store().delete(session_id).await {
        tracing::info!(%session_id, "Session closed");
        HttpResponse::NoContent().finish()
    } else {
        tracing::debug!(%session_id, "DELETE for unknown session");
        HttpResponse::NotFound().finish()
    }
}

async fn handle_resource_metadata(service: Data<AppData>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(&service.resource_metadata)
}

async fn handle_health(service: Data<AppData>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "authorization_server": service.auth_server,
        "mcp_server_url": service.server_url,
        "jwks_uri": service.jwks_uri,
        "token_verification": service.gate.verifies_tokens(),
    }))
}

fn session_header(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(HEADER_SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
}

fn outcome_response(outcome: Outcome) -> HttpResponse {
    let mut response = HttpResponse::build(outcome.status);
    response.insert_header((header::CACHE_CONTROL, "no-cache"));
    if let Some(session_id) = &outcome.session_id {
        response.insert_header((HEADER_SESSION_ID, session_id.as_str()));
    }
    match outcome.body {
        OutcomeBody::Envelope(envelope) => response.json(envelope),
        OutcomeBody::Ack => response.json(json!({})),
    }
}

//! HTTP transport for the MCP endpoint, built on actix-web.
//!
//! ## Endpoints
//!
//! | Route | Gate | Purpose |
//! |---|---|---|
//! | `POST /` | bearer | JSON-RPC requests and notifications |
//! | `GET /` | bearer | session status |
//! | `DELETE /` | bearer | session teardown |
//! | `GET /.well-known/oauth-protected-resource` | public | RFC 9728 metadata |
//! | `GET /.well-known/oauth-resource-metadata` | public | alias of the above |
//! | `GET /health` | public | liveness and discovery summary |
//!
//! Sessions are bound to requests through the `mcp-session-id` header: the
//! response to `initialize` carries a fresh id, and every later request must
//! send it back.
//!
//! ## Example
//!
//! ```rust,no_run
//! use actix_web::{App, HttpServer};
//! use mcp_bearer_server::transport::McpHttpService;
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let service = McpHttpService::builder()
//!         .auth_server("http://localhost:8090")
//!         .server_url("http://localhost:3000")
//!         .build();
//!
//!     HttpServer::new(move || App::new().configure(service.clone().configure()))
//!         .bind("127.0.0.1:3000")?
//!         .run()
//!         .await
//! }
//! ```

/// Bearer gate middleware.
pub mod bearer;

/// Route wiring and handlers.
pub mod http_server;

pub use http_server::{McpHttpService, McpHttpServiceBuilder};

/// Request and response header carrying the session id.
pub const HEADER_SESSION_ID: &str = "mcp-session-id";

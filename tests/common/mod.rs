//! Shared helpers for the HTTP integration tests.

#![allow(dead_code)]

use actix_web::{
    App, Error,
    body::BoxBody,
    dev::{Service, ServiceResponse},
    test,
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mcp_bearer_server::{HEADER_SESSION_ID, McpHttpService};
use serde_json::{Value, json};

pub const AUTH_SERVER: &str = "http://localhost:8090";
pub const SERVER_URL: &str = "http://localhost:3000";
pub const RESOURCE_METADATA_URL: &str =
    "http://localhost:3000/.well-known/oauth-protected-resource";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("mcp_bearer_server=debug")
        .with_test_writer()
        .try_init();
}

pub fn service() -> McpHttpService {
    McpHttpService::builder()
        .auth_server(AUTH_SERVER)
        .server_url(SERVER_URL)
        .jwks_uri("http://localhost:8090/oauth2/jwks")
        .build()
}

/// An unsigned JWT with the given claims. The gate only decodes it.
pub fn token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "RS256", "typ": "JWT"}).to_string());
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn bearer() -> String {
    format!(
        "Bearer {}",
        token(json!({"sub": "user-123", "scope": "mcp:tools", "exp": 4102444800u64}))
    )
}

pub fn initialize_request(id: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "initialize",
        "params": {
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        }
    })
}

pub fn rpc(id: Value, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

pub fn session_id_of(resp: &ServiceResponse<BoxBody>) -> Option<String> {
    resp.headers()
        .get(HEADER_SESSION_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// POSTs `body` with a valid bearer token and optional session header.
pub async fn post<S>(app: &S, session_id: Option<&str>, body: Value) -> ServiceResponse<BoxBody>
where
    S: Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let mut req = test::TestRequest::post()
        .uri("/")
        .insert_header(("Authorization", bearer()))
        .set_json(body);
    if let Some(sid) = session_id {
        req = req.insert_header((HEADER_SESSION_ID, sid));
    }
    test::call_service(app, req.to_request()).await
}

/// Runs `initialize` and returns the new session id.
pub async fn initialize<S>(app: &S) -> String
where
    S: Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error>,
{
    let resp = post(app, None, initialize_request(json!(1))).await;
    assert_eq!(resp.status(), 200);
    session_id_of(&resp).expect("initialize must return mcp-session-id")
}

pub async fn app(
    service: McpHttpService,
) -> impl Service<actix_http::Request, Response = ServiceResponse<BoxBody>, Error = Error> {
    test::init_service(App::new().configure(service.configure())).await
}

use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger};
use anyhow::Context as _;
use clap::Parser;
use mcp_bearer_server::{
    BearerGate, McpHttpService, MethodRegistry, ServerConfig, ServerInfo, SessionStore, ToolTable,
    discovery::{DiscoveryClient, resource_metadata_url},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mcp_bearer_server=info,actix_web=info".into()),
        )
        .init();

    let config = ServerConfig::parse();

    let discovery = DiscoveryClient::new(config.discovery_timeout(), config.insecure_tls)
        .context("build discovery http client")?;

    let jwks_uri = match discovery.fetch_jwks_uri(&config.auth_server).await {
        Ok(uri) => Some(uri),
        Err(e) => {
            tracing::warn!(
                error = %e,
                auth_server = %config.auth_server,
                "Could not fetch authorization server metadata; is it running?"
            );
            None
        }
    };

    let gate = if config.verify_tokens {
        let jwks_uri = jwks_uri
            .as_deref()
            .context("token verification requested but no jwks_uri was discovered")?;
        let keys = discovery
            .fetch_jwks(jwks_uri)
            .await
            .context("fetch JWKS for token verification")?;
        tracing::info!(keys = keys.keys.len(), "Token verification enabled");
        BearerGate::verifying(keys, config.token_audience.clone())
    } else {
        tracing::warn!("Bearer tokens are decoded but NOT verified");
        BearerGate::decode_only()
    };

    let session_store = match config.max_sessions {
        Some(max) => SessionStore::with_capacity_limit(max),
        None => SessionStore::new(),
    };

    let service = McpHttpService::builder()
        .session_store(Arc::new(session_store))
        .registry(Arc::new(MethodRegistry::new(
            ToolTable::arithmetic(),
            ServerInfo::default(),
        )))
        .gate(Arc::new(gate))
        .auth_server(config.auth_server.clone())
        .server_url(config.server_url.clone())
        .maybe_jwks_uri(jwks_uri.clone())
        .build();

    tracing::info!(
        authorization_server = %config.auth_server,
        mcp_server_url = %config.server_url,
        resource_metadata = %resource_metadata_url(&config.server_url),
        jwks_uri = ?jwks_uri,
        "MCP server starting"
    );

    let bind_addr = config.bind_addr();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(service.clone().configure())
    })
    .bind(&bind_addr)
    .with_context(|| format!("bind {bind_addr}"))?
    .run()
    .await
    .context("run http server")
}

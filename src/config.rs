use std::time::Duration;

use clap::Parser;

/// Runtime configuration, from command-line flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mcp-bearer-server",
    version,
    about = "MCP tool server over HTTP behind an OAuth 2.0 bearer gate"
)]
pub struct ServerConfig {
    /// Base URL of the OAuth 2.0 authorization server protecting this resource.
    #[arg(long, env = "AUTH_SERVER_URL", default_value = "http://localhost:8090")]
    pub auth_server: String,

    /// Public URL of this server; advertised as the protected resource.
    #[arg(long, env = "MCP_SERVER_URL", default_value = "http://localhost:3000")]
    pub server_url: String,

    #[arg(long = "host", env = "MCP_BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: String,

    #[arg(long, env = "MCP_SERVER_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Verify bearer tokens against the authorization server's JWKS instead of
    /// only decoding them.
    #[arg(long, env = "MCP_VERIFY_TOKENS", default_value_t = false)]
    pub verify_tokens: bool,

    /// Expected `aud` claim when verifying tokens.
    #[arg(long, env = "MCP_TOKEN_AUDIENCE")]
    pub token_audience: Option<String>,

    /// Maximum number of live sessions; the oldest is evicted past this.
    #[arg(long, env = "MCP_MAX_SESSIONS")]
    pub max_sessions: Option<usize>,

    #[arg(long = "discovery-timeout-secs", default_value_t = 10)]
    pub discovery_timeout_secs: u64,

    /// Accept invalid TLS certificates from the authorization server.
    #[arg(long, env = "MCP_INSECURE_TLS", default_value_t = false)]
    pub insecure_tls: bool,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }
}

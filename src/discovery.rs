//! OAuth discovery documents.
//!
//! Two directions: this server *publishes* RFC 9728 protected-resource
//! metadata pointing clients at the authorization server, and at startup it
//! *fetches* the authorization server's RFC 8414 metadata to learn the JWKS
//! location.

use std::time::Duration;

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const PROTECTED_RESOURCE_PATH: &str = "/.well-known/oauth-protected-resource";
/// Older name for the same document, still requested by some clients.
pub const RESOURCE_METADATA_ALIAS_PATH: &str = "/.well-known/oauth-resource-metadata";
pub const AUTHORIZATION_SERVER_METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

pub const SCOPE_MCP_TOOLS: &str = "mcp:tools";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid authorization server url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("authorization server metadata has no jwks_uri")]
    MissingJwksUri,
}

/// RFC 9728 document served on [`PROTECTED_RESOURCE_PATH`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
}

impl ProtectedResourceMetadata {
    pub fn new(resource: impl Into<String>, authorization_server: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            authorization_servers: vec![authorization_server.into()],
            scopes_supported: vec![SCOPE_MCP_TOOLS.to_string()],
            bearer_methods_supported: vec!["header".to_string()],
        }
    }
}

/// Absolute URL of the protected-resource metadata for a server base URL.
pub fn resource_metadata_url(server_url: &str) -> String {
    format!(
        "{}{PROTECTED_RESOURCE_PATH}",
        server_url.trim_end_matches('/')
    )
}

#[derive(Debug, Clone, Deserialize)]
struct AuthorizationServerMetadata {
    #[serde(default)]
    jwks_uri: Option<String>,
}

/// Startup-only client for the authorization server.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
}

impl DiscoveryClient {
    pub fn new(timeout: Duration, insecure_tls: bool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure_tls)
            .build()?;
        Ok(Self { http })
    }

    /// Fetches `{auth_server}/.well-known/oauth-authorization-server` and
    /// returns its `jwks_uri`.
    pub async fn fetch_jwks_uri(&self, auth_server: &str) -> Result<String, DiscoveryError> {
        let metadata_url = Url::parse(auth_server)
            .and_then(|base| base.join(AUTHORIZATION_SERVER_METADATA_PATH))
            .map_err(|source| DiscoveryError::InvalidUrl {
                url: auth_server.to_string(),
                source,
            })?;

        tracing::debug!(url = %metadata_url, "Fetching authorization server metadata");

        let metadata: AuthorizationServerMetadata = self
            .get_json(metadata_url.as_str())
            .await?;

        metadata.jwks_uri.ok_or(DiscoveryError::MissingJwksUri)
    }

    pub async fn fetch_jwks(&self, jwks_uri: &str) -> Result<JwkSet, DiscoveryError> {
        tracing::debug!(url = %jwks_uri, "Fetching JWKS");
        self.get_json(jwks_uri).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DiscoveryError> {
        let http_err = |source| DiscoveryError::Http {
            url: url.to_string(),
            source,
        };
        self.http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(http_err)?
            .json::<T>()
            .await
            .map_err(http_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protected_resource_metadata_shape() {
        let doc = ProtectedResourceMetadata::new("http://localhost:3000", "http://localhost:8090");
        assert_eq!(
            serde_json::to_value(doc).unwrap(),
            json!({
                "resource": "http://localhost:3000",
                "authorization_servers": ["http://localhost:8090"],
                "scopes_supported": ["mcp:tools"],
                "bearer_methods_supported": ["header"]
            })
        );
    }

    #[test]
    fn metadata_url_ignores_trailing_slash() {
        assert_eq!(
            resource_metadata_url("http://localhost:3000/"),
            "http://localhost:3000/.well-known/oauth-protected-resource"
        );
    }

    #[tokio::test]
    async fn invalid_auth_server_url_is_reported() {
        let client = DiscoveryClient::new(Duration::from_secs(1), false).unwrap();
        let err = client.fetch_jwks_uri("not a url").await.unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidUrl { .. }));
    }
}

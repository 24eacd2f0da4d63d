//! Bearer token gate.
//!
//! By default the gate only *decodes* the JWT payload: no signature, expiry,
//! issuer or audience check is made, and any well-formed token is let through.
//! The decoded claims are logged in full on every attempt. Building the gate
//! with [`BearerGate::verifying`] switches to real verification against the
//! authorization server's JWKS.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{DecodingKey, Validation};
use rmcp::model::JsonObject;
use serde_json::Value;
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

/// Decoded token claims, attached to the request extensions once the gate passes.
#[derive(Clone, Debug, PartialEq)]
pub struct BearerClaims(pub JsonObject);

impl BearerClaims {
    /// The `sub` claim, if it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }
}

/// Why a request failed the gate. The `Display` text is the reason reported to
/// the client.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GateRejection {
    #[error("Missing Authorization header")]
    MissingHeader,
    #[error("Invalid Authorization header format")]
    InvalidFormat,
    #[error("Token decode error: {0}")]
    Decode(String),
    #[error("Token verification error: {0}")]
    Verification(String),
}

impl GateRejection {
    /// Value of the `WWW-Authenticate` challenge for this rejection.
    pub fn challenge(&self, resource_metadata_url: &str) -> String {
        match self {
            GateRejection::MissingHeader => {
                format!(r#"Bearer realm="mcp", resource_metadata="{resource_metadata_url}""#)
            }
            other => format!(
                r#"Bearer error="invalid_token", error_description="{other}", resource_metadata="{resource_metadata_url}""#
            ),
        }
    }
}

#[derive(Debug)]
struct JwksVerifier {
    keys: JwkSet,
    audience: Option<String>,
}

#[derive(Debug, Default)]
pub struct BearerGate {
    verifier: Option<JwksVerifier>,
}

impl BearerGate {
    /// Decode-only gate.
    pub fn decode_only() -> Self {
        Self::default()
    }

    /// Gate that verifies signature and expiry against `keys`, and the `aud`
    /// claim when `audience` is given.
    pub fn verifying(keys: JwkSet, audience: Option<String>) -> Self {
        Self {
            verifier: Some(JwksVerifier { keys, audience }),
        }
    }

    pub fn verifies_tokens(&self) -> bool {
        self.verifier.is_some()
    }

    /// Checks the raw `Authorization` header value.
    pub fn check(&self, header: Option<&str>) -> Result<BearerClaims, GateRejection> {
        let header = header.ok_or(GateRejection::MissingHeader)?;
        let token = header
            .strip_prefix(BEARER_PREFIX)
            .ok_or(GateRejection::InvalidFormat)?;

        let result = match &self.verifier {
            None => decode_unverified(token),
            Some(verifier) => verifier.verify(token),
        };

        match &result {
            Ok(claims) => {
                let pretty = serde_json::to_string_pretty(&claims.0)
                    .unwrap_or_else(|_| "{}".to_string());
                if self.verifies_tokens() {
                    tracing::info!(claims = %pretty, "Access token verified");
                } else {
                    tracing::info!(claims = %pretty, "Access token decoded (no validation)");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Error decoding access token"),
        }

        result
    }
}

impl JwksVerifier {
    fn verify(&self, token: &str) -> Result<BearerClaims, GateRejection> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| GateRejection::Decode(e.to_string()))?;

        let jwk = match header.kid.as_deref() {
            Some(kid) => self.keys.find(kid),
            None => self.keys.keys.first(),
        }
        .ok_or_else(|| GateRejection::Verification("no matching key in JWKS".to_string()))?;

        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| GateRejection::Verification(e.to_string()))?;

        let mut validation = Validation::new(header.alg);
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        jsonwebtoken::decode::<JsonObject>(token, &key, &validation)
            .map(|data| BearerClaims(data.claims))
            .map_err(|e| GateRejection::Verification(e.to_string()))
    }
}

/// Splits a compact JWS and decodes its payload without looking at the signature.
fn decode_unverified(token: &str) -> Result<BearerClaims, GateRejection> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(GateRejection::Decode("Not enough segments".to_string()));
    };

    let header = decode_segment(header)
        .map_err(|e| GateRejection::Decode(format!("Invalid header: {e}")))?;
    if !header.is_object() {
        return Err(GateRejection::Decode(
            "Invalid header: must be a JSON object".to_string(),
        ));
    }

    match decode_segment(payload)
        .map_err(|e| GateRejection::Decode(format!("Invalid payload: {e}")))?
    {
        Value::Object(claims) => Ok(BearerClaims(claims)),
        _ => Err(GateRejection::Decode(
            "Invalid payload: must be a JSON object".to_string(),
        )),
    }
}

fn decode_segment(segment: &str) -> Result<Value, String> {
    // Tolerate padded segments; JWTs normally omit padding.
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| e.to_string())?;
    serde_json::from_slice(&bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: &Value) -> String {
        URL_SAFE_NO_PAD.encode(value.to_string())
    }

    fn token(claims: Value) -> String {
        format!(
            "{}.{}.c2lnbmF0dXJl",
            encode(&json!({"alg": "RS256", "typ": "JWT"})),
            encode(&claims)
        )
    }

    #[test]
    fn missing_header_is_rejected() {
        let gate = BearerGate::decode_only();
        assert_eq!(gate.check(None), Err(GateRejection::MissingHeader));
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let gate = BearerGate::decode_only();
        assert_eq!(
            gate.check(Some("Basic dXNlcjpwYXNz")),
            Err(GateRejection::InvalidFormat)
        );
        assert_eq!(
            GateRejection::InvalidFormat.to_string(),
            "Invalid Authorization header format"
        );
    }

    #[test]
    fn claims_are_decoded_without_verification() {
        let gate = BearerGate::decode_only();
        // Expired, unsigned and for someone else: still accepted.
        let header = format!(
            "Bearer {}",
            token(json!({"sub": "alice", "exp": 1, "aud": "elsewhere"}))
        );

        let claims = gate.check(Some(&header)).unwrap();
        assert_eq!(claims.subject(), Some("alice"));
        assert_eq!(claims.0.get("exp"), Some(&json!(1)));
    }

    #[test]
    fn malformed_token_reports_decode_failure() {
        let gate = BearerGate::decode_only();

        let err = gate.check(Some("Bearer not-a-jwt")).unwrap_err();
        assert!(matches!(err, GateRejection::Decode(_)));
        assert!(err.to_string().starts_with("Token decode error: "));

        let bad_payload = format!("Bearer {}.!!!.sig", encode(&json!({"alg": "none"})));
        assert!(matches!(
            gate.check(Some(&bad_payload)),
            Err(GateRejection::Decode(_))
        ));
    }

    #[test]
    fn payload_must_be_an_object() {
        let gate = BearerGate::decode_only();
        let header = format!("Bearer {}", token(json!(["not", "claims"])));
        assert!(matches!(
            gate.check(Some(&header)),
            Err(GateRejection::Decode(_))
        ));
    }

    #[test]
    fn challenge_names_resource_metadata() {
        let url = "http://localhost:3000/.well-known/oauth-protected-resource";
        assert_eq!(
            GateRejection::MissingHeader.challenge(url),
            format!(r#"Bearer realm="mcp", resource_metadata="{url}""#)
        );
        let challenge = GateRejection::InvalidFormat.challenge(url);
        assert!(challenge.starts_with(r#"Bearer error="invalid_token""#));
        assert!(challenge.contains(url));
    }

    #[test]
    fn verifying_gate_rejects_unsigned_tokens() {
        let gate = BearerGate::verifying(JwkSet { keys: vec![] }, None);
        let header = format!("Bearer {}", token(json!({"sub": "alice"})));
        assert!(gate.check(Some(&header)).is_err());
    }
}

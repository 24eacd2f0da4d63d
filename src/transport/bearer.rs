//! Middleware running the [`BearerGate`](crate::auth::BearerGate) in front of
//! the protected routes.
//!
//! On success the decoded [`BearerClaims`] are stored in the request
//! extensions and the request continues. On failure the wrapped handler is
//! never called: the client gets a 401 with a `WWW-Authenticate` challenge
//! pointing at the protected-resource metadata, and a JSON-RPC `-32001` body.

use actix_web::{
    Error, FromRequest, HttpMessage, HttpResponse,
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::{Method, header},
    middleware::Next,
    web::{Bytes, Data},
};
use serde_json::Value;

use super::http_server::AppData;
use crate::auth::{BearerClaims, GateRejection};
use crate::protocol::{JsonRpcResponse, codes, peek_request_id};

// Enough of the header to tell tokens apart in logs without printing them.
const TOKEN_PREVIEW_CHARS: usize = 27;

pub(crate) async fn bearer_gate<B: MessageBody + 'static>(
    req: ServiceRequest,
    next: Next<B>,
) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    let Some(state) = req.app_data::<Data<AppData>>().cloned() else {
        tracing::error!("Bearer gate mounted without application data");
        return Err(actix_web::error::ErrorInternalServerError(
            "bearer gate is not configured",
        ));
    };

    let result = match req.headers().get(header::AUTHORIZATION) {
        None => state.gate.check(None),
        Some(value) => match value.to_str() {
            Ok(value) => {
                let preview: String = value.chars().take(TOKEN_PREVIEW_CHARS).collect();
                tracing::debug!(token = %preview, "Validating token");
                state.gate.check(Some(value))
            }
            Err(_) => Err(GateRejection::InvalidFormat),
        },
    };

    match result {
        Ok(claims) => {
            tracing::debug!(subject = ?claims.subject(), "Token accepted");
            req.extensions_mut().insert(claims);
            next.call(req).await.map(ServiceResponse::map_into_left_body)
        }
        Err(rejection) => {
            tracing::warn!(
                method = %req.method(),
                path = %req.path(),
                reason = %rejection,
                "Rejecting request at bearer gate"
            );
            let (http_req, mut payload) = req.into_parts();

            // The handler will never read the body, so take it here to echo the id.
            let id = if *http_req.method() == Method::POST {
                match Bytes::from_request(&http_req, &mut payload).await {
                    Ok(body) => peek_request_id(&body),
                    Err(_) => Value::Null,
                }
            } else {
                Value::Null
            };

            let response = unauthorized(&rejection, id, &state.resource_metadata_url);
            Ok(ServiceResponse::new(http_req, response).map_into_right_body())
        }
    }
}

fn unauthorized(rejection: &GateRejection, id: Value, resource_metadata_url: &str) -> HttpResponse {
    HttpResponse::Unauthorized()
        .insert_header((
            header::WWW_AUTHENTICATE,
            rejection.challenge(resource_metadata_url),
        ))
        .json(JsonRpcResponse::error(
            id,
            codes::UNAUTHORIZED,
            format!("Unauthorized: {rejection}"),
        ))
}

/// Claims the gate attached to this request, if it ran.
pub fn request_claims(req: &actix_web::HttpRequest) -> Option<BearerClaims> {
    req.extensions().get::<BearerClaims>().cloned()
}

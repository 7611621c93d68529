//! Learning Middleware
//!
//! - [`attach_request_context`]: turn a bearer access token into a
//!   [`RequestContext`] in the request extensions
//! - [`error_envelope`]: give every non-JSON failure the `{status, error}` body

use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::error::conversions::error_body;
use platform::pipeline::{Principal, RequestContext};
use platform::token::{TokenIssuer, TokenKind, extract_bearer_token};

/// Middleware state
#[derive(Clone)]
pub struct ContextState {
    pub tokens: Arc<TokenIssuer>,
}

/// Never rejects: a missing or bad token yields an anonymous context and
/// the pipeline's authorization step decides
pub async fn attach_request_context(
    State(state): State<ContextState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token);

    let ctx = match token.map(|t| state.tokens.verify(TokenKind::Access, t)) {
        Some(Ok(claims)) => RequestContext::authenticated(Principal {
            subject: claims.sub,
            role: claims.role,
            token_id: claims.jti,
        }),
        Some(Err(e)) => {
            tracing::debug!(error = %e, "Bearer token rejected");
            RequestContext::anonymous()
        }
        None => RequestContext::anonymous(),
    };

    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Replace non-JSON error responses (extractor rejections, unmatched
/// routes, caught panics) with the JSON error body
pub async fn error_envelope(req: Request<Body>, next: Next) -> Response {
    let response = next.run(req).await;
    let status = response.status();

    if status.as_u16() < 400 || is_json(&response) {
        return response;
    }

    tracing::debug!(status = status.as_u16(), "Wrapping non-JSON error response");
    (status, Json(error_body(status.as_u16(), "Request error"))).into_response()
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}

/// Panic handler for `tower_http::catch_panic::CatchPanicLayer::custom`
pub fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> Response {
    tracing::error!("Request handler panicked");
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (status, Json(error_body(status.as_u16(), "Internal server error"))).into_response()
}

/// Extractor for the context placed by [`attach_request_context`]
///
/// Falls back to anonymous when the middleware is not installed.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(
            parts.extensions.get::<RequestContext>().cloned().unwrap_or_default(),
        ))
    }
}

//! API Middleware
//!
//! Bearer-token authentication, the [`Identity`] extractor and request logging.

use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::auth::{parse_bearer, AuthError};
use crate::domain::{Identity, OperationContext};
use crate::error::AppError;

use super::AppState;

pub const CORRELATION_ID_HEADER: &str = "X-Correlation-Id";

// =========================================================================
// Authentication
// =========================================================================

/// Marker left in request extensions when a credential was sent but could
/// not be resolved to a user.
#[derive(Debug, Clone, Copy)]
pub struct RejectedCredential;

/// Resolve an `Authorization: Bearer` credential when one is sent
///
/// Requests whose credential is missing, malformed, unknown or expired pass
/// through anonymously, so public routes such as `POST /token` keep working
/// with a stale header. Protected handlers reject them through the
/// [`Identity`] extractor. Storage failures still surface as errors.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let correlation_id = headers
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let mut context = OperationContext::new().with_correlation_id(correlation_id);

    if let Some(value) = headers.get(header::AUTHORIZATION) {
        let resolved = match value.to_str().ok().and_then(parse_bearer) {
            Some(credential) => match state.access.current_identity(credential).await {
                Ok(identity) => Some(identity),
                Err(AuthError::InvalidToken) => None,
                Err(e) => return Err(AppError::from(e).into_response()),
            },
            None => None,
        };

        match resolved {
            Some(identity) => {
                context = context.with_user(identity.user_id);
                request.extensions_mut().insert(identity);
            }
            None => {
                tracing::debug!(%correlation_id, "Ignoring unresolvable credential");
                request.extensions_mut().insert(RejectedCredential);
            }
        }
    }

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(identity.clone());
        }
        if parts.extensions.get::<RejectedCredential>().is_some() {
            return Err(AppError::from(AuthError::InvalidToken));
        }
        Err(AppError::unauthorized())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for OperationContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<OperationContext>()
            .cloned()
            .unwrap_or_default())
    }
}

// =========================================================================
// Request logging
// =========================================================================

/// Headers that should be masked in logs
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie", "set-cookie"];

/// Mask sensitive headers for logging
pub fn mask_headers_for_logging(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let name_lower = name.as_str().to_lowercase();
            let masked_value = if SENSITIVE_HEADERS.contains(&name_lower.as_str()) {
                "[REDACTED]".to_string()
            } else {
                value.to_str().unwrap_or("[invalid utf8]").to_string()
            };
            (name.to_string(), masked_value)
        })
        .collect()
}

/// Request logging middleware
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();

    let headers = mask_headers_for_logging(request.headers());
    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let start = std::time::Instant::now();

    tracing::info!(
        method = %method,
        uri = %uri,
        version = ?version,
        correlation_id = ?correlation_id,
        headers = ?headers,
        "Incoming request"
    );

    let response = next.run(request).await;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %start.elapsed().as_millis(),
        correlation_id = ?correlation_id,
        "Request completed"
    );

    response
}

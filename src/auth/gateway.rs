//! Bearer-token admission for protected routes
//!
//! Used as axum middleware:
//! `route_layer(middleware::from_fn_with_state(issuer, require_bearer))`.
//! A rejected request is answered with 401 and never reaches the inner handler.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::auth::issuer::TokenIssuer;
use crate::auth::AuthError;

/// Middleware that admits only requests carrying a live bearer token
///
/// On success the token's `AccessGrant` is inserted into the request extensions.
pub async fn require_bearer(
    State(issuer): State<TokenIssuer>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        debug!("Rejecting request without bearer token");
        return AuthError::MissingToken.into_response();
    };

    match issuer.validate(&token).await {
        Ok(grant) => {
            request.extensions_mut().insert(grant);
            next.run(request).await
        }
        Err(e) => {
            warn!("Rejecting bearer token: {}", e);
            e.into_response()
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
///
/// The scheme is matched case-insensitively; anything else is malformed.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token.to_string())
}

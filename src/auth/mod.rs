//! OAuth2.1 authorization-code grant and bearer admission
//!
//! This module handles the minimal authorization flow that gates the
//! streaming transport: `/authorize` hands out single-use codes, `/token`
//! trades a code for a bearer token, and the gateway middleware checks that
//! token on every protected request.

pub mod gateway;
pub mod issuer;
pub mod store;

pub use gateway::{bearer_token, require_bearer};
pub use issuer::{
    AccessGrant, AuthorizationCode, AuthorizeRequest, TokenIssuer, TokenRequest, TokenResponse,
};
pub use store::{ExpiringStore, MemoryStore, StoreError};

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors raised by the authorization endpoints and the gateway
///
/// These are answered at the HTTP level and never reach the JSON-RPC layer.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid client_id")]
    InvalidClient,

    #[error("Invalid redirect_uri")]
    InvalidRedirectUri,

    #[error("Invalid response_type")]
    UnsupportedResponseType,

    #[error("Invalid grant_type")]
    UnsupportedGrantType,

    #[error("invalid or expired authorization code")]
    InvalidCode,

    #[error("Mismatched client_id")]
    MismatchedClient,

    #[error("Mismatched redirect_uri")]
    MismatchedRedirectUri,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unauthorized")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingToken | Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// OAuth error code for the response body
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidClient => "invalid_client",
            Self::InvalidRedirectUri | Self::MalformedRequest(_) => "invalid_request",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidCode | Self::MismatchedClient | Self::MismatchedRedirectUri => {
                "invalid_grant"
            }
            Self::MissingToken | Self::InvalidToken => "invalid_token",
            Self::Store(_) | Self::Internal(_) => "server_error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.error_code(),
            "error_description": self.to_string(),
        }));

        let mut response = (status, body).into_response();
        match self {
            Self::MissingToken => {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            Self::InvalidToken => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer error=\"invalid_token\""),
                );
            }
            _ => {}
        }
        response
    }
}

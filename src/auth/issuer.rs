//! Authorization code and access token issuance
//!
//! Codes live under `auth_code:{code}` and tokens under
//! `access_token:{token}` in the shared `ExpiringStore`, as JSON records.

use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::auth::store::ExpiringStore;
use crate::auth::AuthError;
use crate::config::AuthConfig;

const AUTH_CODE_PREFIX: &str = "auth_code:";
const ACCESS_TOKEN_PREFIX: &str = "access_token:";

/// Query parameters of `GET /authorize`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub response_type: String,
}

/// Form fields of `POST /token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
}

/// What an issued authorization code was bound to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
}

/// What a live access token grants; attached to admitted requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub client_id: String,
    pub scope: String,
}

/// Successful `/token` response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub scope: String,
}

/// Issues and validates credentials for the single configured client
#[derive(Clone)]
pub struct TokenIssuer {
    config: Arc<AuthConfig>,
    store: Arc<dyn ExpiringStore>,
}

impl TokenIssuer {
    pub fn new(config: AuthConfig, store: Arc<dyn ExpiringStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Handle an authorization request, returning the redirect target
    ///
    /// The target is `redirect_uri` with `code` and `state` appended to its query.
    pub async fn authorize(&self, request: AuthorizeRequest) -> Result<Url, AuthError> {
        self.check_client(&request.client_id, &request.redirect_uri)?;
        if request.response_type != "code" {
            return Err(AuthError::UnsupportedResponseType);
        }

        let mut redirect =
            Url::parse(&request.redirect_uri).map_err(|e| AuthError::Internal(e.to_string()))?;

        // 16 bytes = 128 bits of entropy
        let code = random_hex(16);
        let record = AuthorizationCode {
            client_id: request.client_id,
            redirect_uri: request.redirect_uri,
            scope: request.scope,
            state: request.state,
        };
        let value = serde_json::to_string(&record).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.store
            .set_with_ttl(&format!("{AUTH_CODE_PREFIX}{code}"), value, self.config.code_ttl)
            .await?;

        redirect
            .query_pairs_mut()
            .append_pair("code", &code)
            .append_pair("state", &record.state);

        info!("Issued authorization code for client {}", record.client_id);
        Ok(redirect)
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange(&self, request: TokenRequest) -> Result<TokenResponse, AuthError> {
        if request.grant_type != "authorization_code" {
            return Err(AuthError::UnsupportedGrantType);
        }
        self.check_client(&request.client_id, &request.redirect_uri)?;

        // The code is consumed here, before any further check.
        let stored = self
            .store
            .take(&format!("{AUTH_CODE_PREFIX}{}", request.code))
            .await?
            .ok_or(AuthError::InvalidCode)?;
        let record: AuthorizationCode = serde_json::from_str(&stored).map_err(|e| {
            warn!("Discarding corrupt authorization code record: {}", e);
            AuthError::InvalidCode
        })?;

        if record.client_id != request.client_id {
            return Err(AuthError::MismatchedClient);
        }
        if record.redirect_uri != request.redirect_uri {
            return Err(AuthError::MismatchedRedirectUri);
        }

        let token = random_hex(32);
        let grant = AccessGrant {
            client_id: record.client_id,
            scope: record.scope,
        };
        let value = serde_json::to_string(&grant).map_err(|e| AuthError::Internal(e.to_string()))?;
        self.store
            .set_with_ttl(&format!("{ACCESS_TOKEN_PREFIX}{token}"), value, self.config.token_ttl)
            .await?;

        info!("Issued access token for client {}", grant.client_id);
        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_ttl.as_secs(),
            scope: grant.scope,
        })
    }

    /// Look up a bearer token, failing if it was never issued or has expired
    pub async fn validate(&self, token: &str) -> Result<AccessGrant, AuthError> {
        let stored = self
            .store
            .get(&format!("{ACCESS_TOKEN_PREFIX}{token}"))
            .await?
            .ok_or(AuthError::InvalidToken)?;
        serde_json::from_str(&stored).map_err(|_| AuthError::InvalidToken)
    }

    fn check_client(&self, client_id: &str, redirect_uri: &str) -> Result<(), AuthError> {
        if client_id != self.config.client_id {
            return Err(AuthError::InvalidClient);
        }
        if redirect_uri != self.config.redirect_uri {
            return Err(AuthError::InvalidRedirectUri);
        }
        Ok(())
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

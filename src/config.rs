//! Runtime configuration for the server
//!
//! Values come from command line flags (with environment fallbacks) in
//! `main`; the defaults here match a stock Claude Desktop connector setup.

use std::time::Duration;

use crate::mcp::protocol::ServerInfo;

/// Client id accepted by the authorization endpoints
pub const DEFAULT_CLIENT_ID: &str = "claude-desktop";
/// Redirect URI accepted by the authorization endpoints
pub const DEFAULT_REDIRECT_URI: &str = "https://claude.ai/oauth/callback";

/// Lifetime of an authorization code
pub const AUTH_CODE_TTL: Duration = Duration::from_secs(600);
/// Lifetime of an access token
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);
/// How often expired store entries are evicted
pub const STORE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Settings for the authorization-code grant
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// The single statically registered client
    pub client_id: String,
    /// The only redirect URI that client may use
    pub redirect_uri: String,
    pub code_ttl: Duration,
    pub token_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            code_ttl: AUTH_CODE_TTL,
            token_ttl: ACCESS_TOKEN_TTL,
            sweep_interval: STORE_SWEEP_INTERVAL,
        }
    }
}

/// Top-level server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Name reported in `initialize` and `/health`
    pub name: String,
    pub version: String,
    pub auth: AuthConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "toolbox-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            auth: AuthConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn server_info(&self) -> ServerInfo {
        ServerInfo {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

//! Public library interface for the toolbox MCP server
//!
//! This module exports the server implementation and the public types that
//! embedding applications and tests use: the tool interface and registry,
//! the protocol types, the transports and the OAuth components.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::info;

pub mod auth;
pub mod config;
pub mod http;
pub mod mcp;
pub mod tools;

// Re-export public modules and types
pub use auth::{AuthError, ExpiringStore, MemoryStore, StoreError, TokenIssuer};
pub use config::{AuthConfig, ServerConfig};
pub use mcp::protocol::{JsonRpcResponse, ToolCallResult, ToolContent};
pub use mcp::{McpHandler, McpServer};
pub use tools::{RegistryError, Tool, ToolArgs, ToolError, ToolRegistry};

/// Errors that can occur during server operation
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Tool registration error: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Main server: the tool registry plus the credential store behind OAuth
///
/// The registry is frozen when the server is built; both transports share it.
pub struct ToolboxServer {
    config: ServerConfig,
    registry: Arc<ToolRegistry>,
    store: MemoryStore,
    sweeper: JoinHandle<()>,
}

impl ToolboxServer {
    /// Create a server with the given tools
    ///
    /// Must be called inside a tokio runtime; it starts the store sweeper.
    pub fn new(config: ServerConfig, registry: ToolRegistry) -> Self {
        info!(
            "Initializing {} v{} with {} tools",
            config.name,
            config.version,
            registry.len()
        );

        let store = MemoryStore::new();
        let sweeper = store.spawn_sweeper(config.auth.sweep_interval);

        Self {
            config,
            registry: Arc::new(registry),
            store,
            sweeper,
        }
    }

    /// Registry with the built-in tools registered
    pub fn default_registry(config: &ServerConfig) -> Result<ToolRegistry, ServerError> {
        let mut registry = ToolRegistry::new();
        registry.register(tools::EchoTool::new())?;
        registry.register(tools::ServerStatusTool::new(config.server_info()))?;
        Ok(registry)
    }

    /// Method handler shared by both transports
    pub fn handler(&self) -> McpHandler {
        McpHandler::new(Arc::clone(&self.registry), self.config.server_info())
    }

    /// Token issuer backed by this server's store
    pub fn issuer(&self) -> TokenIssuer {
        TokenIssuer::new(self.config.auth.clone(), Arc::new(self.store.clone()))
    }

    /// Run the MCP server over stdin/stdout until EOF or Ctrl-C
    pub async fn run_stdio(&self) -> Result<(), ServerError> {
        McpServer::new(self.handler()).run().await
    }

    /// Serve the HTTP surface on `addr` until Ctrl-C
    pub async fn serve_http(&self, addr: SocketAddr) -> Result<(), ServerError> {
        let state = http::AppState::new(self.handler(), self.issuer());
        http::serve(addr, state, shutdown_signal()).await
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get a reference to the credential store (useful for testing)
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Drop for ToolboxServer {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be installed
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Unable to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

//! MCP tools exposed to clients
//!
//! This module defines the capability interface every tool implements, the
//! registry that owns them, and the dispatcher that validates arguments and
//! turns tool outcomes into protocol results.

pub mod dispatcher;
pub mod echo;
pub mod registry;
pub mod schema;
pub mod status;

pub use dispatcher::ToolDispatcher;
pub use echo::EchoTool;
pub use registry::{RegistryError, ToolRegistry};
pub use status::ServerStatusTool;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Arguments handed to a tool, already validated against its schema
pub type ToolArgs = Map<String, Value>;

/// Errors a tool call can end with
///
/// All of these surface to the client as a successful JSON-RPC response
/// whose result has `isError: true`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool '{name}' not found. Available tools: {}", available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    /// Wrap any displayable failure from a tool body
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }
}

/// The capability interface of a callable tool
///
/// Implementations must not block the async runtime; blocking work belongs
/// in `tokio::task::spawn_blocking`.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g., "echo")
    fn name(&self) -> &str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// JSON schema of the `arguments` object
    fn input_schema(&self) -> Value;

    /// Run the tool. The returned value becomes the text content of the result.
    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError>;
}

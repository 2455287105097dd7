//! MCP protocol implementation
//!
//! This module handles the Model Context Protocol communication: frame
//! decoding, method routing, and the two transports (stdio and streaming).

pub mod codec;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod stream;

// Re-export main types
pub use handler::McpHandler;
pub use server::McpServer;
pub use stream::ResponseStream;

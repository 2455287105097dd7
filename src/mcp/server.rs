//! Stdio transport: one JSON-RPC frame per line on stdin/stdout
//!
//! This module implements the stdio MCP server that:
//! 1. Reads one line at a time from stdin
//! 2. Fully handles it, including any tool call, before reading the next
//! 3. Writes the response (if any) as one line to stdout
//!
//! Responses therefore leave in exactly the order requests arrived.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use crate::mcp::codec::{decode_frame, encode_frame};
use crate::mcp::handler::McpHandler;
use crate::mcp::protocol::JsonRpcResponse;
use crate::ServerError;

/// MCP server speaking newline-delimited JSON over a byte stream
pub struct McpServer {
    handler: McpHandler,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(handler: McpHandler) -> Self {
        Self { handler }
    }

    /// Run the MCP server on the process's stdin/stdout until EOF or Ctrl-C
    pub async fn run(&self) -> Result<(), ServerError> {
        info!("Starting MCP server, waiting for JSON-RPC requests...");

        let stdin = BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();
        self.serve(stdin, stdout, crate::shutdown_signal()).await
    }

    /// Serve frames from `reader` to `writer` until EOF or `shutdown` resolves
    ///
    /// `shutdown` is only observed while waiting for the next line, so a
    /// request that is already being handled always completes and is answered.
    /// Read or write failures are returned as errors.
    pub async fn serve<R, W, F>(&self, mut reader: R, mut writer: W, shutdown: F) -> Result<(), ServerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut buf = Vec::new();

        loop {
            buf.clear();

            let read = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("MCP server shutting down (interrupted)");
                    break;
                }
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => {
                    info!("MCP server shutting down (stdin closed)");
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if let Some(response) = self.process_line(&line).await {
                        let frame = encode_frame(&response)?;
                        writer.write_all(frame.as_bytes()).await?;
                        writer.flush().await?;
                        debug!("Sent response: {}", frame.trim_end());
                    }
                }
                Err(e) => {
                    error!("Failed to read from stdin: {}", e);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Process a single line of JSON-RPC input
    async fn process_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        debug!("Processing request: {}", line);

        match decode_frame(line) {
            Ok(message) => self.handler.handle_message(message).await,
            Err(e) => {
                error!("Failed to decode JSON-RPC frame: {}", e);
                Some(e.to_response())
            }
        }
    }
}

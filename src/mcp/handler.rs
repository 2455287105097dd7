//! Method routing for the fixed MCP method set
//!
//! Both transports hand classified messages to `McpHandler`. Requests get
//! exactly one response carrying their id; notifications and client
//! responses are logged and produce nothing.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::mcp::protocol::*;
use crate::tools::{ToolDispatcher, ToolRegistry};

/// Handles MCP methods on behalf of a transport
///
/// Cheap to clone; the streaming transport hands a clone to every dispatch task.
#[derive(Debug, Clone)]
pub struct McpHandler {
    dispatcher: ToolDispatcher,
    info: ServerInfo,
}

impl McpHandler {
    pub fn new(registry: Arc<ToolRegistry>, info: ServerInfo) -> Self {
        Self {
            dispatcher: ToolDispatcher::new(registry),
            info,
        }
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.info
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Handle any inbound message, returning the response to send if there is one
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        match message {
            JsonRpcMessage::Request(request) => Some(self.handle_request(request).await),
            JsonRpcMessage::Notification(notification) => {
                self.handle_notification(&notification);
                None
            }
            JsonRpcMessage::Response(response) => {
                debug!("Ignoring client response for id {}", response.id);
                None
            }
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!("Handling method '{}' (id {})", request.method, request.id);
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request),
            "tools/list" => self.handle_tools_list(request),
            "tools/call" => self.handle_tools_call(request).await,
            "ping" => JsonRpcResponse::success(request.id, json!({ "pong": true })),
            _ => JsonRpcResponse::error(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                format!("Method '{}' not found", request.method),
            ),
        }
    }

    /// Log a notification; they never produce a response
    pub fn handle_notification(&self, notification: &JsonRpcNotification) {
        match notification.method.as_str() {
            "notifications/initialized" | "initialized" => info!("MCP client initialized"),
            "notifications/cancelled" => debug!("Client cancelled a request"),
            method => warn!("Ignoring notification for unknown method '{}'", method),
        }
    }

    /// Handle MCP initialization request
    fn handle_initialize(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        info!("MCP client connected");

        let result = InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: ServerCapabilities { tools: Map::new() },
            server_info: self.info.clone(),
        };

        respond(request.id, &result)
    }

    /// Handle tools/list request
    fn handle_tools_list(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.dispatcher.registry().list_protocol_tools(),
        };
        respond(request.id, &result)
    }

    /// Handle tools/call request
    async fn handle_tools_call(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let tool_params: ToolCallParams = match request.params {
            Some(params) => match serde_json::from_value(params) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(
                        request.id,
                        error_codes::INVALID_PARAMS,
                        format!("Invalid parameters: {}", e),
                    );
                }
            },
            None => {
                return JsonRpcResponse::error(
                    request.id,
                    error_codes::INVALID_PARAMS,
                    "Missing parameters",
                );
            }
        };

        let result = self
            .dispatcher
            .execute(&tool_params.name, tool_params.arguments)
            .await;

        respond(request.id, &result)
    }
}

/// Serialize a result payload, falling back to an internal error
fn respond<T: Serialize>(id: Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => {
            error!("Failed to serialize result: {}", e);
            JsonRpcResponse::error(id, error_codes::INTERNAL_ERROR, format!("Internal error: {}", e))
        }
    }
}

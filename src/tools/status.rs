//! Tool for checking server status
//!
//! This module implements the server_status MCP tool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::mcp::protocol::ServerInfo;
use crate::tools::{Tool, ToolArgs, ToolError};

/// Parameters for checking server status
#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct StatusParams {
    /// Include process details (pid)
    pub verbose: Option<bool>,
}

/// Response from checking server status
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub version: String,
    pub status: &'static str,
    pub started_at: String,
    pub uptime_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Reports name, version and uptime of the running server
#[derive(Debug)]
pub struct ServerStatusTool {
    info: ServerInfo,
    started_at: DateTime<Utc>,
}

impl ServerStatusTool {
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            started_at: Utc::now(),
        }
    }
}

#[async_trait]
impl Tool for ServerStatusTool {
    fn name(&self) -> &str {
        "server_status"
    }

    fn description(&self) -> &str {
        "Get server status: name, version, start time and uptime"
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(StatusParams)).unwrap_or(Value::Null)
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        let params: StatusParams =
            serde_json::from_value(Value::Object(args)).map_err(ToolError::execution)?;

        let response = StatusResponse {
            name: self.info.name.clone(),
            version: self.info.version.clone(),
            status: "ok",
            started_at: self.started_at.to_rfc3339(),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
            pid: params.verbose.unwrap_or(false).then(std::process::id),
        };

        serde_json::to_value(response).map_err(ToolError::execution)
    }
}

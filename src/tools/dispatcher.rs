//! Tool dispatch: lookup, argument validation, invocation
//!
//! Every outcome of a tool call, including an unknown tool name, invalid
//! arguments, an error return or a panic inside the tool, is folded into a
//! `ToolCallResult`. Nothing here can fail the transport that called it.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::mcp::protocol::ToolCallResult;
use crate::tools::schema::validate_arguments;
use crate::tools::{ToolArgs, ToolError, ToolRegistry};

/// Executes tool calls against a shared registry
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute the named tool and normalize the outcome
    pub async fn execute(&self, name: &str, args: ToolArgs) -> ToolCallResult {
        match self.try_execute(name, args).await {
            Ok(value) => ToolCallResult::success(render(value)),
            Err(e) => {
                warn!("Tool call '{}' failed: {}", name, e);
                ToolCallResult::error(e.to_string())
            }
        }
    }

    async fn try_execute(&self, name: &str, args: ToolArgs) -> Result<Value, ToolError> {
        let tool = self.registry.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
            available: self.registry.names(),
        })?;

        validate_arguments(&tool.input_schema(), &args)?;

        info!("Executing tool: {}", name);
        match AssertUnwindSafe(tool.execute(args)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Tool '{}' panicked: {}", name, message);
                Err(ToolError::Execution(format!("tool '{}' panicked: {}", name, message)))
            }
        }
    }
}

/// Strings are passed through as-is; everything else is serialized
fn render(value: Value) -> String {
    match value {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

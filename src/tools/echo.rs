//! Tool that returns its arguments unchanged
//!
//! Useful for checking a client's wiring end to end.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::tools::{Tool, ToolArgs, ToolError};

#[derive(Debug, Default)]
pub struct EchoTool;

impl EchoTool {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the provided arguments back as JSON"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": true
        })
    }

    async fn execute(&self, args: ToolArgs) -> Result<Value, ToolError> {
        Ok(Value::Object(args))
    }
}

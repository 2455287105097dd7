//! Lightweight argument validation against a tool's input schema
//!
//! Only the subset of JSON schema that tool definitions actually use is
//! checked: `required` keys and the primitive `type` of each declared
//! property. Anything else in the schema is ignored.

use serde_json::Value;

use crate::tools::{ToolArgs, ToolError};

/// Check `args` against `schema`, reporting the first offending field
pub fn validate_arguments(schema: &Value, args: &ToolArgs) -> Result<(), ToolError> {
    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(field) {
                return Err(ToolError::InvalidArgument {
                    field: field.to_string(),
                    reason: "missing required argument".to_string(),
                });
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (key, value) in args {
        let Some(declared) = properties.get(key).and_then(|p| p.get("type")) else {
            continue;
        };
        let allowed: Vec<&str> = match declared {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
            _ => continue,
        };
        if !allowed.iter().any(|name| matches_type(name, value)) {
            return Err(ToolError::InvalidArgument {
                field: key.clone(),
                reason: format!("expected {}, got {}", allowed.join(" or "), type_name(value)),
            });
        }
    }

    Ok(())
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        // Unknown type keywords are not enforced
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

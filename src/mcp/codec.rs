//! Frame decoding and encoding for JSON-RPC envelopes
//!
//! One frame is one line of text holding one JSON value. Decoding classifies
//! the value into a request, notification or response. A message is a
//! notification exactly when its object has no `id` key; `"id": null` is
//! still a request.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::mcp::protocol::{
    error_codes, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
};

/// Errors produced while decoding a single frame
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("batching not supported")]
    Batch,

    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// The `id` of the offending object, when it had one
        id: Option<Value>,
        reason: String,
    },
}

impl FrameError {
    fn invalid(id: Option<Value>, reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            id,
            reason: reason.into(),
        }
    }

    /// The id a reply must carry, if this frame can be correlated at all
    pub fn correlation_id(&self) -> Option<&Value> {
        match self {
            Self::InvalidRequest { id, .. } => id.as_ref(),
            Self::Parse(_) | Self::Batch => None,
        }
    }

    /// Error response for a transport that always has a reply channel
    ///
    /// Uncorrelated failures are answered with `id: null`.
    pub fn to_response(&self) -> JsonRpcResponse {
        let id = self.correlation_id().cloned().unwrap_or(Value::Null);
        match self {
            Self::Parse(_) => JsonRpcResponse::error(id, error_codes::PARSE_ERROR, "Parse error")
                .with_data(Value::String(self.to_string())),
            Self::Batch => {
                JsonRpcResponse::error(id, error_codes::INVALID_REQUEST, self.to_string())
            }
            Self::InvalidRequest { .. } => {
                JsonRpcResponse::error(id, error_codes::INVALID_REQUEST, self.to_string())
            }
        }
    }
}

/// Decode one frame of text into a classified message
pub fn decode_frame(line: &str) -> Result<JsonRpcMessage, FrameError> {
    let value: Value = serde_json::from_str(line)?;
    classify(value)
}

/// Classify an already-parsed JSON value
pub fn classify(value: Value) -> Result<JsonRpcMessage, FrameError> {
    let mut object = match value {
        Value::Object(object) => object,
        Value::Array(_) => return Err(FrameError::Batch),
        _ => return Err(FrameError::invalid(None, "message must be a JSON object")),
    };

    // Key presence, not value: `"id": null` is a request.
    let id = object.remove("id");
    if let Some(bad) = id.as_ref().filter(|id| !is_valid_id(id)) {
        let reason = format!("id must be a string, number or null, got {}", bad);
        return Err(FrameError::invalid(id, reason));
    }

    match object.remove("method") {
        Some(Value::String(method)) => {
            let params = object.remove("params");
            if let Some(params) = &params {
                if !params.is_object() && !params.is_array() {
                    return Err(FrameError::invalid(id, "params must be an object or array"));
                }
            }
            Ok(match id {
                Some(id) => JsonRpcMessage::Request(JsonRpcRequest { id, method, params }),
                None => JsonRpcMessage::Notification(JsonRpcNotification { method, params }),
            })
        }
        Some(_) => Err(FrameError::invalid(id, "method must be a string")),
        None => decode_response(id, object),
    }
}

fn is_valid_id(id: &Value) -> bool {
    matches!(id, Value::String(_) | Value::Number(_) | Value::Null)
}

fn decode_response(id: Option<Value>, mut object: Map<String, Value>) -> Result<JsonRpcMessage, FrameError> {
    let Some(id) = id else {
        return Err(FrameError::invalid(None, "missing method"));
    };
    if !object.contains_key("result") && !object.contains_key("error") {
        return Err(FrameError::invalid(Some(id), "missing method"));
    }

    object.insert("id".to_string(), id.clone());
    object
        .entry("jsonrpc")
        .or_insert_with(|| Value::String("2.0".to_string()));
    serde_json::from_value(Value::Object(object))
        .map(JsonRpcMessage::Response)
        .map_err(|e| FrameError::invalid(Some(id), e.to_string()))
}

/// Encode a response as one newline-terminated frame
pub fn encode_frame<T: serde::Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Largest frame accepted on the streaming transport, in bytes
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Incremental splitter that turns arbitrary body chunks into lines
///
/// Chunks from an HTTP body do not respect frame boundaries, so partial
/// lines are buffered until their newline arrives. `pending` never holds a
/// newline, so each chunk is scanned once. A frame longer than the limit is
/// dropped along with everything up to its terminating newline.
#[derive(Debug)]
pub struct LineBuffer {
    pending: Vec<u8>,
    max_frame: usize,
    discarding: bool,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(max_frame: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_frame,
            discarding: false,
        }
    }

    /// Bytes held for the current unterminated frame
    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    /// Feed a chunk and collect every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|b| *b == b'\n') {
            let head = &rest[..pos];
            rest = &rest[pos + 1..];

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if self.pending.len() + head.len() > self.max_frame {
                warn!("Dropping frame longer than {} bytes", self.max_frame);
                self.pending.clear();
                continue;
            }

            self.pending.extend_from_slice(head);
            let raw = std::mem::take(&mut self.pending);
            if let Some(line) = Self::normalize(&raw) {
                lines.push(line);
            }
        }

        if !self.discarding {
            if self.pending.len() + rest.len() > self.max_frame {
                warn!("Dropping frame longer than {} bytes", self.max_frame);
                self.pending = Vec::new();
                self.discarding = true;
            } else {
                self.pending.extend_from_slice(rest);
            }
        }
        lines
    }

    /// Take the unterminated remainder at end of input
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Self::normalize(&rest)
    }

    fn normalize(raw: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_string())
        }
    }
}

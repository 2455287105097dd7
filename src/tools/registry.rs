//! Name-indexed registry of tools
//!
//! Populated once at startup and shared read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::mcp::protocol::ToolDefinition;
use crate::tools::Tool;

/// Errors raised while registering a tool
///
/// These indicate a programming error in a tool definition and abort startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Tool name cannot be empty")]
    EmptyName,

    #[error("Tool '{0}' must define a description")]
    EmptyDescription(String),

    #[error("Tool '{0}' must define an input schema")]
    EmptySchema(String),
}

/// Registry of tools keyed by name
///
/// Listing order is registration order. Re-registering a name replaces the
/// tool in place so the registry never holds two tools with one name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool already registered under its name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    /// Register an already shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        Self::check(tool.as_ref())?;

        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => {
                warn!("Tool '{}' already registered, overwriting", name);
                self.tools[slot] = tool;
            }
            None => {
                self.index.insert(name.clone(), self.tools.len());
                self.tools.push(tool);
            }
        }
        debug!("Registered tool: {}", name);
        Ok(())
    }

    fn check(tool: &dyn Tool) -> Result<(), RegistryError> {
        let name = tool.name();
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if tool.description().trim().is_empty() {
            return Err(RegistryError::EmptyDescription(name.to_string()));
        }
        let schema_is_empty = match tool.input_schema() {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if schema_is_empty {
            return Err(RegistryError::EmptySchema(name.to_string()));
        }
        Ok(())
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.index.get(name).map(|&slot| Arc::clone(&self.tools[slot]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Tool definitions as advertised by `tools/list`
    pub fn list_protocol_tools(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

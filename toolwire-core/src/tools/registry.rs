//! Tool Registry for tool registration and lookup
//!
//! The `ToolRegistry` is populated once at startup by discovery and then
//! shared behind an `Arc`; it is never mutated while serving requests.
//! Tools are kept in registration order so `tools/list` output is stable.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolwire_core::tools::ToolRegistry;
//!
//! let mut registry = ToolRegistry::new();
//! registry.register(search_tool)?;
//! registry.register(open_page_tool)?;
//!
//! let tool = registry.get("search").unwrap();
//! let browser_tools = registry.filter_by_group("browser");
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use super::tool::{RegisteredTool, Tool};

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// Tool with this name already exists
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// Tool not found
    #[error("Tool '{0}' not found")]
    NotFound(String),
}

/// Registry of callable tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<RegisteredTool>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.tools.len())
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool
    ///
    /// Returns an error if a tool with the same name is already registered;
    /// the existing registration is kept.
    pub fn register(&mut self, tool: RegisteredTool) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(Arc::new(tool));
        Ok(())
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<RegisteredTool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Get a tool by name or fail with [`RegistryError::NotFound`]
    pub fn require(&self, name: &str) -> Result<&Arc<RegisteredTool>, RegistryError> {
        self.get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All registered tools in registration order
    pub fn all(&self) -> &[Arc<RegisteredTool>] {
        &self.tools
    }

    /// Published definitions in registration order
    pub fn tools(&self) -> Vec<&Tool> {
        self.tools.iter().map(|t| &t.tool).collect()
    }

    /// Get all tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Filter tools by tag
    pub fn filter_by_tag(&self, tag: &str) -> Vec<&Arc<RegisteredTool>> {
        self.tools
            .iter()
            .filter(|t| t.tool.annotations.tags.iter().any(|candidate| candidate == tag))
            .collect()
    }

    /// Filter tools by group
    pub fn filter_by_group(&self, group: &str) -> Vec<&Arc<RegisteredTool>> {
        self.tools
            .iter()
            .filter(|t| t.tool.annotations.group.as_deref() == Some(group))
            .collect()
    }
}

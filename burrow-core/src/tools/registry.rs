//! Tool registry: registration, lookup, and listing
//!
//! Tools are listed in registration order so `tools/list` is stable.

use super::capability::CapabilityPolicy;
use super::tool::Tool;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// Tool with this name already exists
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// Tool not found
    #[error("Tool '{0}' not found")]
    NotFound(String),
}

/// Summary of a tool for the CLI catalogue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// What the tool returns
    pub returns: String,
    /// Required capabilities
    pub required_capabilities: Vec<String>,
}

impl From<&dyn Tool> for ToolSummary {
    fn from(tool: &dyn Tool) -> Self {
        let metadata = tool.metadata();
        Self {
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            returns: metadata.returns.clone(),
            required_capabilities: tool
                .required_capabilities()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Tool information for MCP listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolInfo {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON Schema for input parameters
    pub input_schema: serde_json::Value,
}

impl From<&dyn Tool> for McpToolInfo {
    fn from(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.schema().parameters,
        }
    }
}

/// Name-indexed collection of tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
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
    /// Returns an error if a tool with the same name is already registered.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegistryError::DuplicateTool(name));
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register multiple tools at once
    pub fn register_all(&mut self, tools: Vec<Arc<dyn Tool>>) -> Result<(), RegistryError> {
        for tool in tools {
            self.register(tool)?;
        }
        Ok(())
    }

    /// Keep only the named tools
    pub fn retain(&mut self, names: &[String]) {
        self.tools.retain(|tool| names.iter().any(|n| n == tool.name()));
        self.index = self
            .tools
            .iter()
            .enumerate()
            .map(|(i, tool)| (tool.name().to_string(), i))
            .collect();
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get all tool names, in registration order
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

    /// List all tools with their summaries
    pub fn list(&self) -> Vec<ToolSummary> {
        self.tools.iter().map(|t| ToolSummary::from(t.as_ref())).collect()
    }

    /// Get tools for MCP listing
    pub fn mcp_tools(&self) -> Vec<McpToolInfo> {
        self.tools.iter().map(|t| McpToolInfo::from(t.as_ref())).collect()
    }

    /// Get tools for MCP listing, hiding those the policy would refuse
    pub fn mcp_tools_filtered(&self, policy: &CapabilityPolicy) -> Vec<McpToolInfo> {
        self.tools
            .iter()
            .filter(|tool| policy.check_all(&tool.required_capabilities()).is_ok())
            .map(|t| McpToolInfo::from(t.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod registry_tests {
    use super::*;
    use crate::tools::{
        Capability, CapabilitySet, HandlerTool, ToolError, ToolExecutionContext, ToolHandler,
        ToolMetadata, ToolOutput, ToolSchema,
    };
    use async_trait::async_trait;
    use serde_json::Value;

    struct Noop;

    #[async_trait]
    impl ToolHandler for Noop {
        async fn handle(&self, _: Value, _: &ToolExecutionContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text("ok"))
        }
    }

    fn tool(name: &str, caps: &[Capability]) -> Arc<dyn Tool> {
        Arc::new(
            HandlerTool::new(ToolMetadata::new(name, "test tool"), ToolSchema::empty(), Noop)
                .with_capabilities(caps.iter().copied().collect::<CapabilitySet>()),
        )
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("read_file", &[])).unwrap();

        assert!(registry.contains("read_file"));
        assert_eq!(registry.get("read_file").unwrap().name(), "read_file");
        assert!(registry.get("write_file").is_none());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ToolRegistry::new();
        registry.register(tool("a", &[])).unwrap();

        let err = registry.register(tool("a", &[])).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("a".to_string()));
    }

    #[test]
    fn test_listing_keeps_registration_order() {
        let mut registry = ToolRegistry::new();
        registry
            .register_all(vec![tool("zeta", &[]), tool("alpha", &[]), tool("mid", &[])])
            .unwrap();

        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
        let listed: Vec<String> = registry.mcp_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(listed, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_retain_rebuilds_index() {
        let mut registry = ToolRegistry::new();
        registry
            .register_all(vec![tool("a", &[]), tool("b", &[]), tool("c", &[])])
            .unwrap();

        registry.retain(&["c".to_string(), "a".to_string()]);
        assert_eq!(registry.names(), vec!["a", "c"]);
        assert_eq!(registry.get("c").unwrap().name(), "c");
        assert!(!registry.contains("b"));
    }

    #[test]
    fn test_filtered_listing() {
        let mut registry = ToolRegistry::new();
        registry
            .register_all(vec![
                tool("read_file", &[Capability::FilesystemRead]),
                tool("run_command", &[Capability::Subprocess]),
            ])
            .unwrap();

        let policy = CapabilityPolicy::deny_many([Capability::Subprocess]);
        let listed = registry.mcp_tools_filtered(&policy);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "read_file");
        assert_eq!(registry.list()[1].required_capabilities, vec!["subprocess"]);
    }
}

//! Tool layer between the MCP server and the workspace components
//!
//! - [`Tool`] / [`ToolHandler`]: what a tool is and how it runs
//! - [`ToolResultEnvelope`]: tagged success/error/cancelled results with provenance
//! - [`CapabilityPolicy`]: which capabilities calls may use
//! - [`ToolRegistry`]: name lookup and listing
//! - [`ToolRuntime`]: policy, validation, deadlines and cancellation around each call
//! - [`builtin_tools`]: the workspace tools themselves
//!
//! # Example
//!
//! ```rust,no_run
//! use burrow_core::tools::{ToolContext, ToolRuntime, ToolRuntimeConfig, builtin_registry};
//! # async fn demo(runner: burrow_core::runner::CommandRunner) -> Result<(), Box<dyn std::error::Error>> {
//! let registry = builtin_registry(&runner)?;
//! let runtime = ToolRuntime::from_config(ToolRuntimeConfig::default());
//!
//! let tool = registry.get("list_files").ok_or("missing tool")?;
//! let result = runtime.execute(tool.as_ref(), serde_json::json!({}), &ToolContext::new()).await;
//! # Ok(())
//! # }
//! ```

mod builtin;
mod capability;
mod registry;
mod result;
mod runtime;
mod tool;

pub use builtin::{BUILTIN_TOOL_NAMES, builtin_tools};
pub use capability::{Capability, CapabilityPolicy, CapabilitySet};
pub use registry::{McpToolInfo, RegistryError, ToolRegistry, ToolSummary};
pub use result::{
    NO_MATCH, PolicyDecision, ToolError, ToolErrorKind, ToolProvenance, ToolResult,
    ToolResultEnvelope, ToolWarning, ValidationError,
};
pub use runtime::{ToolContext, ToolRuntime, ToolRuntimeConfig};
pub use tool::{
    BoxedTool, HandlerTool, Tool, ToolExecutionContext, ToolHandler, ToolMetadata, ToolOutput,
    ToolSchema, args_hash, parse_args,
};

use crate::runner::CommandRunner;

/// Registry holding every built-in tool
pub fn builtin_registry(runner: &CommandRunner) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    registry.register_all(builtin_tools(runner))?;
    Ok(registry)
}

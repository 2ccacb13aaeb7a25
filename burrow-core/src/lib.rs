//! # Burrow - a sandboxed workspace for tool-using agents
//!
//! Burrow exposes a workspace directory to a remote agent as a set of MCP
//! tools. The agent can read, write and edit files by row or substring, move
//! a logical current directory, run shell commands and Python scripts, and
//! start long-running processes it can later inspect and stop.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use burrow_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = BurrowConfig::load()?;
//!     let workspace = Workspace::create(config.workspace.expanded_root())?;
//!
//!     let server = McpServer::for_workspace(&config, workspace)?;
//!     Arc::new(server).run(&mut StdioTransport::new()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Workspace**: the fixed root, the current logical directory, and
//!   containment of every resolved path
//! - **Editor**: row-addressed insert, delete and update on text files
//! - **Runner**: shell commands, Python scripts, npm and Vite launches
//! - **Process registry**: detached children by pid, with captured output
//! - **Tools**: capability policy, deadlines and tagged results around each call
//! - **MCP**: JSON-RPC 2.0 over stdio

pub mod config;
pub mod editor;
pub mod error;
pub mod mcp;
pub mod process;
pub mod runner;
pub mod tools;
pub mod workspace;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        BurrowConfig, ConfigBuilder, ProcessConfig, RunnerConfig, ServerConfig, WorkspaceConfig,
    };
    pub use crate::editor::{EditContent, EditOutcome, LineBuffer, RowTarget};
    pub use crate::error::{BurrowError, Result};
    pub use crate::mcp::{
        JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpServer, McpServerBuilder,
        McpServerConfig, MemoryTransport, RequestId, StdioTransport, Transport,
    };
    pub use crate::process::{OutputMode, ProcessInfo, ProcessRegistry, StopOutcome};
    pub use crate::runner::{CommandRunner, ExecMode, LaunchReport, PythonRun};
    pub use crate::tools::{
        BoxedTool, Capability, CapabilityPolicy, CapabilitySet, Tool, ToolContext, ToolError,
        ToolErrorKind, ToolRegistry, ToolResult, ToolResultEnvelope, ToolRuntime,
        ToolRuntimeConfig, builtin_registry,
    };
    pub use crate::workspace::Workspace;
}

//! Model Context Protocol (MCP) Server Implementation
//!
//! Exposes the workspace tools to MCP clients over JSON-RPC 2.0.
//!
//! # Example
//!
//! ```rust,no_run
//! use burrow_core::mcp::{McpServer, StdioTransport};
//! use burrow_core::tools::ToolRegistry;
//! use std::sync::Arc;
//!
//! # async fn demo(registry: ToolRegistry) -> burrow_core::error::Result<()> {
//! let server = McpServer::builder()
//!     .name("burrow")
//!     .with_tools(registry)
//!     .build();
//!
//! Arc::new(server).run(&mut StdioTransport::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Protocol Overview
//!
//! - `initialize` / `notifications/initialized` - Connection setup
//! - `ping` - Liveness check
//! - `tools/list` - List available tools
//! - `tools/call` - Call a tool
//! - `notifications/cancelled` - Abandon an in-flight tool call
//!
//! # References
//!
//! - [MCP Specification](https://modelcontextprotocol.io/specification)

mod protocol;
mod server;
mod transport;

pub use protocol::*;
pub use server::{McpServer, McpServerBuilder, McpServerConfig, render};
pub use transport::{Inbound, MemoryTransport, StdioTransport, Transport};

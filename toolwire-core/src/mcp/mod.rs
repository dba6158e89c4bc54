//! Model Context Protocol (MCP) server
//!
//! Exposes the tool registry to MCP-compatible clients over JSON-RPC 2.0.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolwire_core::config::ToolwireConfig;
//! use toolwire_core::mcp::McpServer;
//!
//! let server = McpServer::builder()
//!     .config(ToolwireConfig::load()?)
//!     .with_source(my_actions)
//!     .build()
//!     .await?;
//!
//! server.run_stdio().await?;
//! ```
//!
//! # Protocol Overview
//!
//! - `initialize` / `notifications/initialized` - Connection setup
//! - `ping` - Liveness check
//! - `tools/list` - List available tools
//! - `tools/call` - Call a tool
//! - `resources/list` - List available resources
//! - `prompts/list` - List available prompts
//! - `server/config` - Server identity, limits and execution defaults
//!
//! Tool failures use the standard JSON-RPC codes plus -32001 (tool not
//! found), -32002 (timeout), -32003 (execution error) and -32004
//! (parameter validation).
//!
//! # References
//!
//! - [MCP Specification](https://modelcontextprotocol.io/specification)

mod handler;
mod protocol;
mod server;
mod transport;

pub use handler::JsonRpcHandler;
pub use protocol::*;
pub use server::{McpServer, McpServerBuilder};
pub use transport::{
    LineReader, LineTransport, LineWriter, MemoryReader, MemoryTransport, MemoryTransportHandle,
    MemoryWriter, MessageReader, MessageWriter, StdioTransport, Transport,
};

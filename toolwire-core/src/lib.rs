//! # Toolwire - A Tool Protocol Runtime for AI Agents
//!
//! Toolwire exposes callable actions to AI client agents over JSON-RPC with
//! fast startup and isolated failure handling per tool:
//! - Discovery of actions from explicit registration tables
//! - JSON-schema generation from parameter descriptors
//! - JSON-RPC dispatch with timeouts, cancellation and panic isolation
//! - A description cache so generated descriptions survive restarts
//! - Step budgets and confidence-based early stopping for multi-step tasks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use toolwire_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = McpServer::builder()
//!         .config(ToolwireConfig::load()?)
//!         .with_source(SystemActions)
//!         .build()
//!         .await?;
//!
//!     server.run_stdio().await
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Discovery**: action sources are built into an immutable registry once
//!   at startup; a broken method is logged and skipped
//! - **Execution**: each call runs on its own task under a concurrency bound
//! - **Descriptions**: explicit, then curated, then cached, then derived from
//!   the method name
//! - **Execution control**: policy plus a step loop for long-running tasks

pub mod builtin;
pub mod cache;
pub mod config;
pub mod error;
pub mod execution;
pub mod mcp;
pub mod schema;
pub mod tools;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::builtin::SystemActions;
    pub use crate::cache::{
        BackfillReport, DescriptionBackfill, DescriptionGenerator, DescriptionStore,
        FileDescriptionStore, InMemoryDescriptionStore, NoopCacheProvider, StoreCacheProvider,
        ToolDescription, ToolDescriptionCacheProvider,
    };
    pub use crate::config::{DescriptionCacheConfig, ToolwireConfig};
    pub use crate::error::{Result, ToolwireError};
    pub use crate::execution::{
        ExecutionMode, ExecutionParameters, ExecutionParamsError, StepContext, StepLoop,
        StepOutcome, StopReason, TaskReport,
    };
    pub use crate::mcp::{
        ContentBlock, JsonRpcError, JsonRpcHandler, JsonRpcRequest, JsonRpcResponse, McpServer,
        McpServerBuilder, RequestId, StdioTransport, ToolCallResult, Transport,
    };
    pub use crate::schema::{ParamKind, ParamSpec, SchemaGenerator, ToolInputSchema};
    pub use crate::tools::{
        ActionError, ActionHandler, ActionMethod, ActionOutput, ActionSet, ActionSource,
        ExecutionError, InvocationContext, MethodToolBuilder, Tool, ToolArguments,
        ToolDiscoveryService, ToolExecutor, ToolExecutorConfig, ToolRegistry, handler_fn,
    };
}

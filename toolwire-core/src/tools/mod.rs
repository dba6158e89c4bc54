//! Tool system: discovery, registry and execution
//!
//! Action sources declare methods with parameter descriptors. At startup the
//! `ToolDiscoveryService` builds them into an immutable `ToolRegistry`; the
//! `ToolExecutor` then serves invocations from that registry.
//! Key features:
//! - Per-method failure isolation during discovery
//! - Description precedence (explicit, curated, cached, humanized)
//! - Lenient argument coercion with declared-constraint validation
//! - Timeouts, cancellation and panic isolation per invocation
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolwire_core::schema::ParamSpec;
//! use toolwire_core::tools::{
//!     ActionMethod, ActionOutput, ActionSet, ToolDiscoveryService, ToolExecutor,
//!     ToolExecutorConfig, handler_fn,
//! };
//!
//! # async fn run() {
//! let source = ActionSet::new("search").with_action(
//!     ActionMethod::new("searchResumes", handler_fn(|args, _ctx| async move {
//!         Ok(ActionOutput::text(format!("searching for {:?}", args.str("query"))))
//!     }))
//!     .with_param(ParamSpec::string("query")),
//! );
//!
//! let report = ToolDiscoveryService::default().discover(&[&source]);
//! let executor = ToolExecutor::new(Arc::new(report.registry), ToolExecutorConfig::default());
//! let result = executor
//!     .execute("searchResumes", serde_json::json!({"instructions": "rust"}))
//!     .await;
//! # }
//! ```

mod args;
mod builder;
mod discovery;
mod executor;
mod registry;
mod result;
mod tool;

pub use args::{ArgValue, ArgumentError, ToolArguments, map_arguments};
pub use builder::{DescriptionTable, MAX_TOOL_NAME_LEN, MethodToolBuilder, humanize};
pub use discovery::{DiscoveryError, DiscoveryReport, ToolDiscoveryService};
pub use executor::{ToolExecutor, ToolExecutorConfig};
pub use registry::{RegistryError, ToolRegistry};
pub use result::{ActionError, ActionOutput, ExecutionError};
pub use tool::{
    ActionHandler, ActionMethod, ActionSet, ActionSource, DescriptionSource, FnHandler,
    InvocationContext, RegisteredTool, Tool, ToolAnnotations, ToolExample, handler_fn,
};

//! Tool execution with argument mapping, timeouts and isolation
//!
//! Each invocation runs on its own tokio task so a panicking or runaway
//! handler never takes the dispatch loop down with it. A semaphore bounds
//! the number of handlers running at once; time spent waiting for a permit
//! counts against the invocation's timeout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::timeout;

use super::args::{ArgumentError, map_arguments};
use super::registry::ToolRegistry;
use super::result::{ActionError, ExecutionError};
use super::tool::InvocationContext;
use crate::mcp::ToolCallResult;

/// Configuration for the tool executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolExecutorConfig {
    /// Timeout for tools that do not declare their own
    #[serde(with = "humantime_serde")]
    pub default_timeout: Duration,

    /// Maximum number of handlers running at once
    pub max_concurrent_invocations: usize,
}

impl Default for ToolExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            max_concurrent_invocations: 64,
        }
    }
}

impl ToolExecutorConfig {
    /// Create a config with a specific default timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Set the concurrency bound
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent_invocations = max_concurrent;
        self
    }
}

/// Runs tools from a shared registry
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    config: ToolExecutorConfig,
    permits: Arc<Semaphore>,
}

impl ToolExecutor {
    /// Create an executor over the given registry
    pub fn new(registry: Arc<ToolRegistry>, config: ToolExecutorConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_invocations.max(1)));
        Self {
            registry,
            config,
            permits,
        }
    }

    /// The registry being served
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Get the executor configuration
    pub fn config(&self) -> &ToolExecutorConfig {
        &self.config
    }

    /// Effective timeout for a tool
    pub fn timeout_for(&self, tool_name: &str) -> Duration {
        self.registry
            .get(tool_name)
            .and_then(|t| t.tool.annotations.timeout())
            .unwrap_or(self.config.default_timeout)
    }

    /// Map arguments, invoke the tool and wrap its output.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] carrying the tool name; the underlying
    /// handler error is only logged.
    pub async fn execute(&self, tool_name: &str, arguments: Value) -> Result<ToolCallResult, ExecutionError> {
        let registered = self
            .registry
            .get(tool_name)
            .cloned()
            .ok_or_else(|| ExecutionError::NotFound {
                tool: tool_name.to_string(),
            })?;

        let args = map_arguments(&registered.layout, &arguments).map_err(|e| argument_error(tool_name, e))?;

        let tool_timeout = registered
            .tool
            .annotations
            .timeout()
            .unwrap_or(self.config.default_timeout);
        let ctx = InvocationContext::new(tool_name, &arguments, tool_timeout);
        let cancellation = ctx.cancellation.clone();
        let invocation_id = ctx.invocation_id;

        tracing::debug!(
            tool = %tool_name,
            invocation_id = %invocation_id,
            args_digest = %ctx.args_digest,
            timeout_ms = tool_timeout.as_millis() as u64,
            "Invoking tool"
        );

        let started = Instant::now();
        let permits = Arc::clone(&self.permits);
        let handler = Arc::clone(&registered.handler);
        let mut handle = tokio::spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|_| ActionError::Cancelled)?;
            handler.call(args, ctx).await
        });

        let outcome = match timeout(tool_timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                cancellation.cancel();
                handle.abort();
                tracing::warn!(
                    tool = %tool_name,
                    invocation_id = %invocation_id,
                    timeout_ms = tool_timeout.as_millis() as u64,
                    "Tool timed out"
                );
                return Err(ExecutionError::Timeout {
                    tool: tool_name.to_string(),
                    timeout: tool_timeout,
                });
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(ActionError::InvalidArgument(message))) => {
                tracing::info!(tool = %tool_name, invocation_id = %invocation_id, %message, "Tool rejected arguments");
                return Err(ExecutionError::InvalidParams {
                    tool: tool_name.to_string(),
                    message,
                });
            }
            Ok(Err(error)) => {
                tracing::error!(
                    tool = %tool_name,
                    invocation_id = %invocation_id,
                    elapsed_ms,
                    error = ?error,
                    "Tool failed"
                );
                return Err(ExecutionError::InvocationFailure {
                    tool: tool_name.to_string(),
                    message: error.to_string(),
                });
            }
            Err(join_error) => {
                tracing::error!(
                    tool = %tool_name,
                    invocation_id = %invocation_id,
                    elapsed_ms,
                    error = %join_error,
                    "Tool task did not complete"
                );
                let message = if join_error.is_panic() {
                    "tool panicked".to_string()
                } else {
                    "tool task was cancelled".to_string()
                };
                return Err(ExecutionError::InvocationFailure {
                    tool: tool_name.to_string(),
                    message,
                });
            }
        };

        tracing::debug!(tool = %tool_name, invocation_id = %invocation_id, elapsed_ms, "Tool completed");

        output.into_call_result().map_err(|e| {
            tracing::error!(tool = %tool_name, error = %e, "Failed to serialize tool output");
            ExecutionError::SerializationFailure {
                tool: tool_name.to_string(),
                message: e.to_string(),
            }
        })
    }
}

fn argument_error(tool_name: &str, error: ArgumentError) -> ExecutionError {
    if error.is_constraint() {
        ExecutionError::ParameterValidation {
            tool: tool_name.to_string(),
            message: error.to_string(),
        }
    } else {
        ExecutionError::InvalidParams {
            tool: tool_name.to_string(),
            message: error.to_string(),
        }
    }
}

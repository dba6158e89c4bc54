//! Built-in diagnostic actions
//!
//! Served by the CLI so a client can check connectivity, clocks and timeout
//! handling without any automation backend attached.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::schema::ParamSpec;
use crate::tools::{
    ActionError, ActionHandler, ActionMethod, ActionOutput, ActionSource, InvocationContext,
    ToolArguments, handler_fn,
};

/// Longest pause `wait` accepts
pub const MAX_WAIT_MS: i64 = 60_000;

/// The `echo`, `server_time` and `wait` actions
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemActions;

impl ActionSource for SystemActions {
    fn source_name(&self) -> &str {
        "system"
    }

    fn actions(&self) -> Vec<ActionMethod> {
        vec![
            ActionMethod::new(
                "echo",
                handler_fn(|args, _ctx| async move { Ok(ActionOutput::text(args.require_str("text")?)) }),
            )
            .described("Return the given text unchanged")
            .with_param(ParamSpec::string("text"))
            .in_group("system")
            .with_tag("diagnostic"),
            ActionMethod::new(
                "server_time",
                handler_fn(|_args, _ctx| async move {
                    let now = Utc::now();
                    Ok(ActionOutput::json(json!({
                        "utc": now.to_rfc3339(),
                        "unixMs": now.timestamp_millis(),
                    })))
                }),
            )
            .described("Current server time in UTC")
            .in_group("system")
            .with_tag("diagnostic"),
            ActionMethod::new("wait", Arc::new(WaitHandler))
                .described("Pause for a number of milliseconds, then report back")
                .with_param(
                    ParamSpec::integer("milliseconds")
                        .with_description("How long to wait")
                        .with_range(0.0, MAX_WAIT_MS as f64),
                )
                .with_param(
                    ParamSpec::string("message")
                        .with_description("Text returned once the wait is over")
                        .optional(),
                )
                .in_group("system")
                .with_tag("diagnostic"),
        ]
    }
}

/// Sleeps, giving up early once the invocation is cancelled
struct WaitHandler;

#[async_trait]
impl ActionHandler for WaitHandler {
    async fn call(&self, args: ToolArguments, ctx: InvocationContext) -> Result<ActionOutput, ActionError> {
        let millis = args
            .i64("milliseconds")
            .ok_or_else(|| ActionError::InvalidArgument("milliseconds is required".to_string()))?;
        let millis = u64::try_from(millis)
            .map_err(|_| ActionError::InvalidArgument("milliseconds must not be negative".to_string()))?;

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(millis)) => {}
            _ = ctx.cancellation.cancelled() => {
                tracing::debug!(invocation = %ctx.invocation_id, "Wait cancelled");
                return Err(ActionError::Cancelled);
            }
        }

        let message = args.str("message").unwrap_or("done");
        Ok(ActionOutput::text(format!("{} after {}ms", message, millis)))
    }
}

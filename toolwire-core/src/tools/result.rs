//! Action outputs and the execution error taxonomy
//!
//! Handlers return an `ActionOutput` or an `ActionError`. The executor turns
//! outputs into the uniform content envelope and failures into an
//! `ExecutionError`, which maps onto a JSON-RPC error carrying the tool name.
//! Nothing here ever serializes a raw error chain to the client.

use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

use crate::mcp::{ContentBlock, JsonRpcError, ToolCallResult, error_codes};

/// What a handler produced
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutput {
    /// Plain text
    Text(String),
    /// Structured data, rendered as pretty-printed JSON text
    Json(Value),
    /// Base64-encoded image
    Image { data: String, mime_type: String },
    /// Pre-built content blocks
    Content(Vec<ContentBlock>),
}

impl ActionOutput {
    /// Text output
    pub fn text(text: impl Into<String>) -> Self {
        ActionOutput::Text(text.into())
    }

    /// JSON output
    pub fn json(value: Value) -> Self {
        ActionOutput::Json(value)
    }

    /// Image output
    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        ActionOutput::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Wrap into the content envelope
    pub fn into_call_result(self) -> Result<ToolCallResult, serde_json::Error> {
        let content = match self {
            ActionOutput::Text(text) => vec![ContentBlock::text(text)],
            ActionOutput::Json(value) => vec![ContentBlock::text(serde_json::to_string_pretty(&value)?)],
            ActionOutput::Image { data, mime_type } => vec![ContentBlock::Image { data, mime_type }],
            ActionOutput::Content(blocks) => blocks,
        };
        Ok(ToolCallResult {
            content,
            is_error: false,
        })
    }
}

impl From<String> for ActionOutput {
    fn from(text: String) -> Self {
        ActionOutput::Text(text)
    }
}

impl From<&str> for ActionOutput {
    fn from(text: &str) -> Self {
        ActionOutput::Text(text.to_string())
    }
}

impl From<Value> for ActionOutput {
    fn from(value: Value) -> Self {
        ActionOutput::Json(value)
    }
}

/// Error returned by an action handler
#[derive(Debug, Error)]
pub enum ActionError {
    /// An argument was acceptable to the schema but not to the action
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The action ran and failed
    #[error("{0}")]
    Failed(String),

    /// The action observed cancellation and stopped
    #[error("cancelled")]
    Cancelled,

    /// Any other failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActionError {
    /// Create a failure from the supplied message
    pub fn failed(message: impl Into<String>) -> Self {
        ActionError::Failed(message.into())
    }
}

/// Failure of a `tools/call`
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Tool '{tool}' not found")]
    NotFound { tool: String },

    #[error("Invalid params for tool '{tool}': {message}")]
    InvalidParams { tool: String, message: String },

    #[error("Parameter validation failed for tool '{tool}': {message}")]
    ParameterValidation { tool: String, message: String },

    #[error("Tool '{tool}' timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("Tool '{tool}' failed: {message}")]
    InvocationFailure { tool: String, message: String },

    #[error("Tool '{tool}' produced a result that could not be serialized: {message}")]
    SerializationFailure { tool: String, message: String },
}

impl ExecutionError {
    /// Name of the tool involved
    pub fn tool(&self) -> &str {
        match self {
            ExecutionError::NotFound { tool }
            | ExecutionError::InvalidParams { tool, .. }
            | ExecutionError::ParameterValidation { tool, .. }
            | ExecutionError::Timeout { tool, .. }
            | ExecutionError::InvocationFailure { tool, .. }
            | ExecutionError::SerializationFailure { tool, .. } => tool,
        }
    }

    /// JSON-RPC error code
    pub fn code(&self) -> i32 {
        match self {
            ExecutionError::NotFound { .. } => error_codes::TOOL_NOT_FOUND,
            ExecutionError::InvalidParams { .. } => error_codes::INVALID_PARAMS,
            ExecutionError::ParameterValidation { .. } => error_codes::PARAMETER_VALIDATION_ERROR,
            ExecutionError::Timeout { .. } => error_codes::TOOL_TIMEOUT,
            ExecutionError::InvocationFailure { .. } => error_codes::TOOL_EXECUTION_ERROR,
            ExecutionError::SerializationFailure { .. } => error_codes::INTERNAL_ERROR,
        }
    }

    /// Structured JSON-RPC error with the tool name and an `isError` payload
    pub fn to_rpc_error(&self) -> JsonRpcError {
        let message = self.to_string();
        let mut data = json!({
            "tool": self.tool(),
            "isError": true,
            "content": [ContentBlock::text(message.clone())],
        });
        if let ExecutionError::Timeout { timeout, .. } = self {
            data["timeoutMs"] = json!(timeout.as_millis() as u64);
        }
        JsonRpcError::new(self.code(), message).with_data(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output_rendered_as_text() {
        let result = ActionOutput::json(json!({"status": "ok"}))
            .into_call_result()
            .unwrap();
        assert!(!result.is_error);
        match &result.content[0] {
            ContentBlock::Text { text } => assert!(text.contains("\"status\": \"ok\"")),
            other => panic!("unexpected block: {:?}", other),
        }
    }

    #[test]
    fn test_image_output_envelope() {
        let result = ActionOutput::image("aGVsbG8=", "image/png")
            .into_call_result()
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["content"][0]["type"], "image");
        assert_eq!(json["content"][0]["mimeType"], "image/png");
        assert_eq!(json["isError"], false);
    }

    #[test]
    fn test_timeout_error_mapping() {
        let err = ExecutionError::Timeout {
            tool: "slow_scrape".to_string(),
            timeout: Duration::from_millis(250),
        };
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, error_codes::TOOL_TIMEOUT);
        assert!(rpc.message.contains("slow_scrape"));
        assert!(rpc.message.contains("250ms"));
        let data = rpc.data.unwrap();
        assert_eq!(data["tool"], "slow_scrape");
        assert_eq!(data["isError"], true);
        assert_eq!(data["timeoutMs"], 250);
    }

    #[test]
    fn test_error_codes() {
        let not_found = ExecutionError::NotFound {
            tool: "x".to_string(),
        };
        assert_eq!(not_found.code(), -32001);
        let invalid = ExecutionError::InvalidParams {
            tool: "x".to_string(),
            message: "missing".to_string(),
        };
        assert_eq!(invalid.code(), -32602);
        let failed = ExecutionError::InvocationFailure {
            tool: "x".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(failed.code(), -32003);
    }
}

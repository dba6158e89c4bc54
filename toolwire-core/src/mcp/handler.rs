//! JSON-RPC request handling
//!
//! Raw frames go through parse, validate and dispatch. Tool calls are
//! handed to the [`ToolExecutor`]; every failure becomes a structured
//! JSON-RPC error and nothing is allowed to escape as a panic or a raw
//! error chain.

use futures::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::protocol::*;
use crate::execution::ExecutionParameters;
use crate::tools::{MethodToolBuilder, ToolExecutor, ToolRegistry};

/// Dispatches JSON-RPC messages against a tool registry
pub struct JsonRpcHandler {
    server_info: ServerInfo,
    executor: ToolExecutor,
    descriptions: Arc<MethodToolBuilder>,
    resources: Vec<McpResource>,
    prompts: Vec<McpPrompt>,
    execution_defaults: ExecutionParameters,
    initialized: AtomicBool,
}

impl std::fmt::Debug for JsonRpcHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcHandler")
            .field("server_info", &self.server_info)
            .field("tool_count", &self.executor.registry().len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl JsonRpcHandler {
    /// Create a handler. `descriptions` is the builder that produced the
    /// registry; it supplies cached descriptions and the usage cache.
    pub fn new(server_info: ServerInfo, executor: ToolExecutor, descriptions: Arc<MethodToolBuilder>) -> Self {
        Self {
            server_info,
            executor,
            descriptions,
            resources: Vec::new(),
            prompts: Vec::new(),
            execution_defaults: ExecutionParameters::default(),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn with_resources(mut self, resources: Vec<McpResource>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_prompts(mut self, prompts: Vec<McpPrompt>) -> Self {
        self.prompts = prompts;
        self
    }

    /// Parameters reported by `server/config` for tasks without their own
    pub fn with_execution_defaults(mut self, params: ExecutionParameters) -> Self {
        self.execution_defaults = params;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.executor.registry()
    }

    pub fn executor(&self) -> &ToolExecutor {
        &self.executor
    }

    pub fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Whether the client has completed the initialize handshake
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Handle one raw frame. Returns `None` for notifications.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable JSON-RPC frame");
                return Some(JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error()));
            }
        };

        let object = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Some(JsonRpcResponse::error(
                    RequestId::Null,
                    JsonRpcError::invalid_request("Batch requests are not supported"),
                ));
            }
            _ => {
                return Some(JsonRpcResponse::error(
                    RequestId::Null,
                    JsonRpcError::invalid_request("Request must be a JSON object"),
                ));
            }
        };

        let id = match object.get("id") {
            None => None,
            Some(raw_id) => match serde_json::from_value::<RequestId>(raw_id.clone()) {
                Ok(id) => Some(id),
                Err(_) => {
                    return Some(JsonRpcResponse::error(
                        RequestId::Null,
                        JsonRpcError::invalid_request("Request id must be a string, an integer or null"),
                    ));
                }
            },
        };
        let reply_id = id.clone().unwrap_or(RequestId::Null);
        let notification = matches!(id, None | Some(RequestId::Null));
        let reject = |message: &str| {
            if notification {
                tracing::debug!(reason = %message, "Dropping invalid notification");
                None
            } else {
                Some(JsonRpcResponse::error(reply_id.clone(), JsonRpcError::invalid_request(message)))
            }
        };

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return reject("jsonrpc must be \"2.0\"");
        }
        let Some(method) = object.get("method").and_then(Value::as_str) else {
            return reject("method must be a string");
        };

        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.to_string(),
            params: object.get("params").cloned(),
        };
        self.handle_request(request).await
    }

    /// Handle a parsed request. Returns `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let notification = request.is_notification();
        let outcome = self.dispatch(&request.method, request.params).await;

        if notification {
            if let Err(error) = outcome {
                tracing::debug!(method = %request.method, code = error.code, "Notification failed");
            }
            return None;
        }

        let id = request.id.unwrap_or(RequestId::Null);
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => self.handle_initialize(params),
            "notifications/initialized" | "initialized" => {
                self.initialized.store(true, Ordering::Release);
                Ok(Value::Null)
            }
            "ping" => Ok(json!({})),
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(params).await,
            "resources/list" => to_result(&ResourcesListResult {
                resources: self.resources.clone(),
            }),
            "prompts/list" => to_result(&PromptsListResult {
                prompts: self.prompts.clone(),
            }),
            "server/config" => self.handle_server_config(),
            _ => {
                tracing::debug!(method = %method, "Unknown method");
                Err(JsonRpcError::method_not_found(method))
            }
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        if let Some(params) = params {
            let params: InitializeParams = parse_params(params, "initialize")?;
            tracing::info!(
                client = %params.client_info.name,
                client_version = %params.client_info.version,
                protocol_version = %params.protocol_version,
                "Client initializing"
            );
        }

        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability { list_changed: false }),
            resources: Some(ResourcesCapability {
                subscribe: false,
                list_changed: false,
            }),
            prompts: Some(PromptsCapability { list_changed: false }),
        };

        to_result(&InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities,
            server_info: self.server_info.clone(),
        })
    }

    async fn handle_tools_list(&self) -> Result<Value, JsonRpcError> {
        let registry = self.executor.registry();
        let resolved = join_all(
            registry
                .tools()
                .into_iter()
                .map(|tool| self.descriptions.resolve_description(tool)),
        )
        .await;

        to_result(&ToolsListResult {
            tools: resolved.iter().map(McpTool::from).collect(),
        })
    }

    async fn handle_tools_call(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let Some(params) = params else {
            return Err(JsonRpcError::invalid_params("Missing tool call params"));
        };
        let params: ToolCallParams = parse_params(params, "tools/call")?;

        match self.executor.execute(&params.name, params.arguments).await {
            Ok(result) => {
                if let Some(cache) = self.descriptions.cache() {
                    cache.record_usage(self.descriptions.provider_model(), &params.name);
                }
                serde_json::to_value(&result).map_err(|e| {
                    tracing::error!(tool = %params.name, error = %e, "Failed to serialize tool result");
                    JsonRpcError::internal_error(format!("Failed to serialize result of tool '{}'", params.name))
                })
            }
            Err(e) => {
                tracing::warn!(tool = %params.name, code = e.code(), error = %e, "Tool call failed");
                Err(e.to_rpc_error())
            }
        }
    }

    fn handle_server_config(&self) -> Result<Value, JsonRpcError> {
        let config = self.executor.config();
        to_result(&ServerConfigResult {
            server_info: self.server_info.clone(),
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            tool_count: self.executor.registry().len(),
            default_timeout_ms: config.default_timeout.as_millis() as u64,
            max_concurrent_invocations: config.max_concurrent_invocations,
            provider_model: self.descriptions.provider_model().to_string(),
            execution_defaults: self.execution_defaults.clone(),
        })
    }
}

fn parse_params<T: DeserializeOwned>(params: Value, method: &str) -> Result<T, JsonRpcError> {
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid {} params: {}", method, e)))
}

fn to_result<T: Serialize>(result: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(format!("Failed to serialize result: {}", e)))
}

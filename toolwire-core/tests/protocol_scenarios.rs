//! End-to-end protocol scenarios
//!
//! These tests assemble a server through `McpServerBuilder` and drive it with
//! raw JSON-RPC frames, the way a client would.

use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use toolwire_core::cache::{
    DescriptionStore, FileDescriptionStore, StoreCacheProvider, ToolDescriptionCacheProvider,
};
use toolwire_core::config::{DescriptionCacheConfig, ToolwireConfig};
use toolwire_core::execution::{ExecutionParameters, StepLoop, StepOutcome, StopReason};
use toolwire_core::mcp::{JsonRpcRequest, JsonRpcResponse, McpServer, MemoryTransport, RequestId, error_codes};
use toolwire_core::schema::ParamSpec;
use toolwire_core::tools::{ActionMethod, ActionOutput, ActionSet, handler_fn};

fn browser_actions() -> ActionSet {
    ActionSet::new("browser")
        .with_action(ActionMethod::new(
            "refreshPage",
            handler_fn(|_, _| async { Ok(ActionOutput::text("refreshed")) }),
        ))
        .with_action(
            ActionMethod::new(
                "searchResumes",
                handler_fn(|args, _| async move {
                    let query = args.require_str("query")?;
                    Ok(ActionOutput::json(json!({"query": query, "matches": 3})))
                }),
            )
            .described("Search candidate resumes")
            .with_param(ParamSpec::string("query")),
        )
        .with_action(
            ActionMethod::new(
                "fillForm",
                handler_fn(|args, _| async move {
                    let selector = args.require_str("selector")?;
                    let count = args.i64("count").unwrap_or(0);
                    let submit = args.bool("submit").unwrap_or(false);
                    Ok(ActionOutput::text(format!("{} x{} submit={}", selector, count, submit)))
                }),
            )
            .with_param(ParamSpec::string("selector").with_description("CSS selector of the field"))
            .with_param(ParamSpec::integer("count").with_range(1.0, 10.0))
            .with_param(ParamSpec::typed("submit", "Option<bool>")),
        )
        .with_action(
            ActionMethod::new(
                "slowScrape",
                handler_fn(|_, _| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok(ActionOutput::text("too late"))
                }),
            )
            .with_timeout(Duration::from_millis(100)),
        )
}

fn memory_config() -> ToolwireConfig {
    let mut config = ToolwireConfig::default();
    config.descriptions.cache = DescriptionCacheConfig::Memory;
    config.descriptions.provider_model = "test-model".to_string();
    config
}

async fn server(config: ToolwireConfig) -> McpServer {
    McpServer::builder()
        .config(config)
        .with_source(browser_actions())
        .build()
        .await
        .expect("server should build")
}

async fn request(server: &McpServer, id: i64, method: &str, params: Option<Value>) -> JsonRpcResponse {
    let mut request = JsonRpcRequest::new(id, method);
    if let Some(params) = params {
        request = request.with_params(params);
    }
    let frame = serde_json::to_string(&request).unwrap();
    server
        .handler()
        .handle_message(&frame)
        .await
        .expect("requests with an id get a response")
}

fn tool<'a>(tools: &'a [Value], name: &str) -> &'a Value {
    tools.iter().find(|t| t["name"] == name).unwrap()
}

#[tokio::test]
async fn scenario_a_schemas_follow_generation_rules() {
    let server = server(memory_config()).await;
    let response = request(&server, 1, "tools/list", None).await;
    let result = response.result.unwrap();
    let tools = result["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 4);

    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    let unique: HashSet<&str> = names.iter().copied().collect();
    assert_eq!(unique.len(), names.len());
    assert!(names.iter().all(|n| !n.is_empty()));

    let refresh = tool(tools, "refreshPage");
    assert_eq!(refresh["inputSchema"]["type"], "object");
    let properties = refresh["inputSchema"]["properties"].as_object().unwrap();
    assert_eq!(properties.len(), 1);
    assert_eq!(properties["instructions"]["type"], "string");
    assert_eq!(refresh["inputSchema"]["required"], json!([]));
    assert_eq!(refresh["description"], "refresh page");

    let search = tool(tools, "searchResumes");
    assert_eq!(search["inputSchema"]["required"], json!(["instructions"]));
    assert_eq!(search["inputSchema"]["properties"]["instructions"]["type"], "string");
    assert_eq!(search["inputSchema"]["properties"].as_object().unwrap().len(), 1);

    let fill = tool(tools, "fillForm");
    let properties = &fill["inputSchema"]["properties"];
    assert_eq!(properties["selector"]["type"], "string");
    assert_eq!(properties["selector"]["description"], "CSS selector of the field");
    assert_eq!(properties["count"]["type"], "integer");
    assert_eq!(properties["count"]["maximum"], 10.0);
    assert_eq!(properties["submit"]["type"], "boolean");
    assert_eq!(fill["inputSchema"]["required"], json!(["selector", "count"]));
}

#[tokio::test]
async fn typed_arguments_are_mapped_and_validated() {
    let server = server(memory_config()).await;

    let response = request(
        &server,
        1,
        "tools/call",
        Some(json!({"name": "fillForm", "arguments": {"selector": "#email", "count": "3", "submit": true}})),
    )
    .await;
    assert_eq!(response.result.unwrap()["content"][0]["text"], "#email x3 submit=true");

    let response = request(
        &server,
        2,
        "tools/call",
        Some(json!({"name": "fillForm", "arguments": {"selector": "#email", "count": 42}})),
    )
    .await;
    let error = response.error.unwrap();
    assert_eq!(error.code, error_codes::PARAMETER_VALIDATION_ERROR);
    assert_eq!(error.data.unwrap()["tool"], "fillForm");

    let response = request(
        &server,
        3,
        "tools/call",
        Some(json!({"name": "fillForm", "arguments": {"count": 2}})),
    )
    .await;
    assert_eq!(response.error.unwrap().code, error_codes::INVALID_PARAMS);

    let response = request(
        &server,
        4,
        "tools/call",
        Some(json!({"name": "searchResumes", "arguments": {"instructions": "rust engineer"}})),
    )
    .await;
    let text = response.result.unwrap()["content"][0]["text"].as_str().unwrap().to_string();
    assert!(text.contains("rust engineer"));
}

#[tokio::test]
async fn scenario_b_unknown_tool() {
    let server = server(memory_config()).await;
    let response = request(
        &server,
        7,
        "tools/call",
        Some(json!({"name": "launchRocket", "arguments": {}})),
    )
    .await;

    assert_eq!(response.id, RequestId::Number(7));
    assert!(response.result.is_none());
    let error = response.error.unwrap();
    assert_eq!(error.code, error_codes::TOOL_NOT_FOUND);
    let data = error.data.unwrap();
    assert_eq!(data["isError"], true);
    assert_eq!(data["tool"], "launchRocket");
    assert_eq!(data["content"][0]["type"], "text");
}

#[tokio::test(start_paused = true)]
async fn scenario_c_slow_tool_times_out() {
    let server = server(memory_config()).await;
    let response = request(&server, 1, "tools/call", Some(json!({"name": "slowScrape"}))).await;

    let error = response.error.unwrap();
    assert_eq!(error.code, error_codes::TOOL_TIMEOUT);
    assert!(error.message.contains("slowScrape"));
    assert!(error.message.contains("100ms"));
    let data = error.data.unwrap();
    assert_eq!(data["tool"], "slowScrape");
    assert_eq!(data["timeoutMs"], 100);
    assert_eq!(data["isError"], true);
}

#[tokio::test]
async fn scenario_d_auto_mode_stops_when_confident() {
    let server = server(memory_config()).await;
    let looper = StepLoop::new(ExecutionParameters::auto(10, 0.8)).unwrap();

    let report = looper
        .run(|ctx| {
            let server = server.clone();
            async move {
                let response = request(
                    &server,
                    ctx.step as i64,
                    "tools/call",
                    Some(json!({"name": "refreshPage"})),
                )
                .await;
                anyhow::ensure!(response.error.is_none(), "refresh failed");

                let confidence = if ctx.step == 4 { 0.85 } else { 0.1 * ctx.step as f64 };
                Ok(StepOutcome::new(confidence))
            }
        })
        .await;

    assert_eq!(report.steps_executed, 4);
    assert_eq!(report.stop_reason, StopReason::Confident { confidence: 0.85 });
}

#[tokio::test]
async fn descriptions_survive_restart_and_usage_is_counted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache").join("descriptions.json");

    // A previous run generated a description for the humanized tool
    {
        let store = Arc::new(FileDescriptionStore::open(&path).await.unwrap());
        let provider = StoreCacheProvider::new(store);
        provider
            .store("test-model", "refreshPage", "Reload the current page", 840)
            .await
            .unwrap();
    }

    let store = Arc::new(FileDescriptionStore::open(&path).await.unwrap());
    let provider = Arc::new(StoreCacheProvider::new(store.clone()));
    let cache: Arc<dyn ToolDescriptionCacheProvider> = provider.clone();
    let server = McpServer::builder()
        .config(memory_config())
        .with_cache(cache)
        .with_source(browser_actions())
        .build()
        .await
        .unwrap();

    let response = request(&server, 1, "tools/list", None).await;
    let result = response.result.unwrap();
    let tools = result["tools"].as_array().unwrap();
    assert_eq!(tool(tools, "refreshPage")["description"], "Reload the current page");
    assert_eq!(tool(tools, "searchResumes")["description"], "Search candidate resumes");

    for id in 0..5 {
        let response = request(&server, id, "tools/call", Some(json!({"name": "refreshPage"}))).await;
        assert!(response.error.is_none());
    }
    // Failed calls are not counted
    let response = request(&server, 99, "tools/call", Some(json!({"name": "fillForm"}))).await;
    assert!(response.error.is_some());
    provider.flush().await;

    let row = store.get("test-model", "refreshPage").await.unwrap().unwrap();
    assert_eq!(row.usage_count, 5);
    assert_eq!(row.generation_time_ms, 840);

    let reopened = FileDescriptionStore::open(&path).await.unwrap();
    let row = reopened.get("test-model", "refreshPage").await.unwrap().unwrap();
    assert_eq!(row.usage_count, 5);
}

#[tokio::test]
async fn transport_session() {
    let server = server(memory_config()).await;

    let mut transport = MemoryTransport::new();
    transport
        .push_request(&JsonRpcRequest::new(1i64, "initialize").with_params(json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {"name": "scenario-client", "version": "1.0"}
        })))
        .unwrap();
    transport
        .push_request(&JsonRpcRequest::notification("notifications/initialized"))
        .unwrap();
    transport
        .push_request(&JsonRpcRequest::new(2i64, "server/config"))
        .unwrap();
    transport.push_message(r#"[{"jsonrpc":"2.0","id":3,"method":"ping"}]"#);
    transport
        .push_request(&JsonRpcRequest::new(4i64, "completion/complete"))
        .unwrap();
    let handle = transport.handle();

    server.run(transport).await.unwrap();

    let mut responses = handle.responses();
    responses.sort_by_key(|r| match r.id {
        RequestId::Number(n) => n,
        _ => 0,
    });
    assert_eq!(responses.len(), 4);
    assert!(server.handler().is_initialized());

    assert_eq!(responses[0].error.as_ref().unwrap().code, error_codes::INVALID_REQUEST);
    assert_eq!(responses[1].result.as_ref().unwrap()["serverInfo"]["name"], "toolwire");

    let config = responses[2].result.as_ref().unwrap();
    assert_eq!(config["toolCount"], 4);
    assert_eq!(config["providerModel"], "test-model");
    assert_eq!(config["defaultTimeoutMs"], 30_000);
    assert_eq!(config["executionDefaults"]["maxSteps"], 10);

    assert_eq!(responses[3].error.as_ref().unwrap().code, error_codes::METHOD_NOT_FOUND);
}

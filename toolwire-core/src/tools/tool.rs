//! Tool definitions and the action contract
//!
//! Action sources declare `ActionMethod`s: a handler plus the metadata and
//! parameter descriptors needed to publish it. Discovery turns each method
//! into an immutable `Tool` paired with its handler.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::args::ToolArguments;
use super::result::{ActionError, ActionOutput};
use crate::schema::{ParamLayout, ParamSpec, ToolInputSchema};

/// Example tool invocation shown to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExample {
    /// Example name/description
    pub name: String,

    /// Input arguments
    pub input: Value,

    /// Expected output (or description)
    pub output: Value,
}

impl ToolExample {
    /// Create a new example
    pub fn new(name: impl Into<String>, input: Value, output: Value) -> Self {
        Self {
            name: name.into(),
            input,
            output,
        }
    }
}

/// Client-facing annotations attached to a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<ToolExample>,

    /// Per-tool timeout; the executor default applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub priority: i32,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ToolAnnotations {
    fn default() -> Self {
        Self {
            group: None,
            version: None,
            examples: Vec::new(),
            timeout_ms: None,
            enabled: true,
            priority: 0,
            tags: Vec::new(),
        }
    }
}

impl ToolAnnotations {
    /// Timeout as a `Duration`, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Where a tool's description came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DescriptionSource {
    /// Declared on the action method
    Explicit,
    /// Found in the curated description table
    Curated,
    /// Read from the description cache
    Cached,
    /// Derived from the method name
    Humanized,
}

/// A published tool. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Unique tool name
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Input schema
    pub input_schema: ToolInputSchema,

    /// Client-facing annotations
    pub annotations: ToolAnnotations,

    /// Origin of `description`
    #[serde(skip, default = "humanized")]
    pub description_source: DescriptionSource,
}

fn humanized() -> DescriptionSource {
    DescriptionSource::Humanized
}

impl Tool {
    /// Same tool with a different description
    pub fn with_description(&self, description: impl Into<String>, source: DescriptionSource) -> Self {
        let mut tool = self.clone();
        tool.description = description.into();
        tool.description_source = source;
        tool
    }
}

/// Context handed to a handler for one invocation
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Unique id for log correlation
    pub invocation_id: Uuid,

    /// Tool being invoked
    pub tool_name: String,

    /// Truncated SHA-256 of the raw arguments
    pub args_digest: String,

    /// Timeout enforced by the executor
    pub timeout: Duration,

    /// Cancelled when the executor gives up on the invocation
    pub cancellation: CancellationToken,
}

impl InvocationContext {
    /// Create a context for the given tool and raw arguments
    pub fn new(tool_name: impl Into<String>, raw_args: &Value, timeout: Duration) -> Self {
        let args_json = serde_json::to_string(raw_args).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(args_json.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        Self {
            invocation_id: Uuid::new_v4(),
            tool_name: tool_name.into(),
            args_digest: digest[..16].to_string(),
            timeout,
            cancellation: CancellationToken::new(),
        }
    }

    /// Check if cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Executes one action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action with mapped arguments
    async fn call(
        &self,
        args: ToolArguments,
        ctx: InvocationContext,
    ) -> Result<ActionOutput, ActionError>;
}

/// Adapter turning an async closure into an [`ActionHandler`]
pub struct FnHandler<F> {
    f: F,
}

/// Wrap an async closure as a handler
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(ToolArguments, InvocationContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ActionOutput, ActionError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(ToolArguments, InvocationContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ActionOutput, ActionError>> + Send,
{
    async fn call(
        &self,
        args: ToolArguments,
        ctx: InvocationContext,
    ) -> Result<ActionOutput, ActionError> {
        (self.f)(args, ctx).await
    }
}

/// A marked method exposed by an action source
#[derive(Clone)]
pub struct ActionMethod {
    /// Method name; used as the tool name unless `name` is set
    pub method_name: String,

    /// Explicit tool name
    pub name: Option<String>,

    /// Explicit description
    pub description: Option<String>,

    /// Parameter descriptors in declaration order
    pub params: Vec<ParamSpec>,

    /// Client-facing annotations
    pub annotations: ToolAnnotations,

    /// The handler
    pub handler: Arc<dyn ActionHandler>,
}

impl std::fmt::Debug for ActionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionMethod")
            .field("method_name", &self.method_name)
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

impl ActionMethod {
    /// Declare a method backed by the given handler
    pub fn new(method_name: impl Into<String>, handler: Arc<dyn ActionHandler>) -> Self {
        Self {
            method_name: method_name.into(),
            name: None,
            description: None,
            params: Vec::new(),
            annotations: ToolAnnotations::default(),
            handler,
        }
    }

    /// Override the published tool name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an explicit description
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a parameter
    pub fn with_param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    /// Set the per-tool timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.annotations.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set the group
    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.annotations.group = Some(group.into());
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.annotations.version = Some(version.into());
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.annotations.tags.push(tag.into());
        self
    }

    /// Add an example
    pub fn with_example(mut self, example: ToolExample) -> Self {
        self.annotations.examples.push(example);
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.annotations.priority = priority;
        self
    }

    /// Enable or disable the method
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.annotations.enabled = enabled;
        self
    }

    /// Name the tool will be published under
    pub fn tool_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.method_name)
    }
}

/// Something that exposes action methods
pub trait ActionSource: Send + Sync {
    /// Name used in logs and discovery errors
    fn source_name(&self) -> &str;

    /// The marked methods this source exposes
    fn actions(&self) -> Vec<ActionMethod>;
}

/// A plain list of actions under a name
#[derive(Debug, Clone)]
pub struct ActionSet {
    name: String,
    actions: Vec<ActionMethod>,
}

impl ActionSet {
    /// Create an empty set
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    /// Add an action
    pub fn with_action(mut self, action: ActionMethod) -> Self {
        self.actions.push(action);
        self
    }
}

impl ActionSource for ActionSet {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn actions(&self) -> Vec<ActionMethod> {
        self.actions.clone()
    }
}

/// A tool together with everything needed to invoke it
#[derive(Clone)]
pub struct RegisteredTool {
    /// The published definition
    pub tool: Tool,

    /// Argument layout
    pub layout: ParamLayout,

    /// The handler
    pub handler: Arc<dyn ActionHandler>,

    /// Source that declared the tool
    pub origin: String,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("name", &self.tool.name)
            .field("origin", &self.origin)
            .finish()
    }
}

impl RegisteredTool {
    /// Tool name
    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

#[cfg(test)]
mod tool_tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_fn_invocation() {
        let handler = handler_fn(|args: ToolArguments, _ctx| async move {
            let text = args.str("instructions").unwrap_or("none").to_string();
            Ok(ActionOutput::text(text))
        });

        let args = ToolArguments::from_pairs(vec![(
            "instructions".to_string(),
            crate::tools::ArgValue::String("hello".to_string()),
        )]);
        let ctx = InvocationContext::new("echo", &Value::Null, Duration::from_secs(1));
        let output = handler.call(args, ctx).await.unwrap();
        assert_eq!(output, ActionOutput::text("hello"));
    }

    #[test]
    fn test_action_method_builder() {
        let handler = handler_fn(|_, _| async { Ok(ActionOutput::text("ok")) });
        let method = ActionMethod::new("openPage", handler)
            .named("open_page")
            .with_timeout(Duration::from_secs(45))
            .in_group("browser")
            .with_tag("navigation")
            .with_priority(5);

        assert_eq!(method.tool_name(), "open_page");
        assert_eq!(method.annotations.timeout_ms, Some(45_000));
        assert_eq!(method.annotations.group.as_deref(), Some("browser"));
        assert!(method.annotations.enabled);
    }

    #[test]
    fn test_invocation_context_digest() {
        let args = serde_json::json!({"query": "rust"});
        let a = InvocationContext::new("search", &args, Duration::from_secs(1));
        let b = InvocationContext::new("search", &args, Duration::from_secs(1));
        assert_eq!(a.args_digest, b.args_digest);
        assert_eq!(a.args_digest.len(), 16);
        assert_ne!(a.invocation_id, b.invocation_id);
        assert!(!a.is_cancelled());
    }

    #[test]
    fn test_annotations_serialization() {
        let annotations = ToolAnnotations {
            timeout_ms: Some(1500),
            tags: vec!["web".to_string()],
            ..ToolAnnotations::default()
        };
        let json = serde_json::to_value(&annotations).unwrap();
        assert_eq!(json["timeoutMs"], 1500);
        assert_eq!(json["enabled"], true);
        assert_eq!(json["priority"], 0);
        assert!(json.get("group").is_none());
    }
}

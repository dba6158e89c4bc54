//! MCP Server Implementation
//!
//! The server assembles the tool runtime from configuration and runs it
//! over a transport. Each incoming frame is handled on its own task, so a
//! slow tool never holds up `ping` or `tools/list`.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::handler::JsonRpcHandler;
use super::protocol::{JsonRpcError, JsonRpcResponse, McpPrompt, McpResource, RequestId, ServerInfo};
use super::transport::{MessageReader, MessageWriter, Transport};
use crate::cache::{
    FileDescriptionStore, InMemoryDescriptionStore, StoreCacheProvider, ToolDescriptionCacheProvider,
};
use crate::config::{DescriptionCacheConfig, ToolwireConfig};
use crate::error::{Result, ToolwireError};
use crate::tools::{ActionSource, MethodToolBuilder, ToolDiscoveryService, ToolExecutor, ToolRegistry};

/// Responses waiting for the writer
const RESPONSE_BUFFER: usize = 256;

/// MCP Server
#[derive(Clone)]
pub struct McpServer {
    handler: Arc<JsonRpcHandler>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("handler", &self.handler)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl McpServer {
    /// Create a new MCP server builder
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    /// Serve an already assembled handler
    pub fn from_handler(handler: JsonRpcHandler) -> Self {
        Self {
            handler: Arc::new(handler),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn handler(&self) -> &Arc<JsonRpcHandler> {
        &self.handler
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.handler.registry()
    }

    /// Token that stops the read loop when cancelled. Requests already in
    /// flight are still answered.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run over stdio until the client disconnects
    pub async fn run_stdio(&self) -> Result<()> {
        self.run(super::transport::StdioTransport::stdio()).await
    }

    /// Run the server with a transport until the peer closes it or the
    /// shutdown token fires
    pub async fn run<T: Transport>(&self, transport: T) -> Result<()> {
        let (mut reader, mut writer) = transport.split();
        let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(RESPONSE_BUFFER);

        let writer_task = tokio::spawn(async move {
            while let Some(response) = rx.recv().await {
                let frame = match serde_json::to_string(&response) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!(id = ?response.id, error = %e, "Failed to serialize response");
                        continue;
                    }
                };
                writer.write_message(&frame).await?;
            }
            Ok::<(), ToolwireError>(())
        });

        tracing::info!(tools = self.handler.registry().len(), "MCP server listening");

        let mut in_flight = JoinSet::new();
        let mut read_error = None;
        loop {
            let next = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, no longer reading requests");
                    break;
                }
                next = reader.read_message() => next,
            };

            match next {
                Ok(Some(frame)) => {
                    let handler = Arc::clone(&self.handler);
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        if let Some(response) = handler.handle_message(&frame).await
                            && tx.send(response).await.is_err()
                        {
                            tracing::debug!("Writer closed before response could be sent");
                        }
                    });
                    while let Some(joined) = in_flight.try_join_next() {
                        log_join_failure(joined);
                    }
                }
                Ok(None) => {
                    tracing::info!("Transport closed by peer");
                    break;
                }
                Err(ToolwireError::MalformedFrame(reason)) => {
                    tracing::warn!(%reason, "Rejected undecodable frame");
                    let response = JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error());
                    if tx.send(response).await.is_err() {
                        tracing::debug!("Writer closed before response could be sent");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Transport read failed");
                    read_error = Some(e);
                    break;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join_failure(joined);
        }
        drop(tx);

        let written = writer_task
            .await
            .map_err(|e| ToolwireError::Transport(format!("Response writer failed: {}", e)))?;
        if let Err(e) = written {
            tracing::error!(error = %e, "Transport write failed");
            return Err(e);
        }

        match read_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

fn log_join_failure(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined
        && e.is_panic()
    {
        tracing::error!(error = %e, "Request task panicked");
    }
}

/// Builder for MCP Server
pub struct McpServerBuilder {
    config: ToolwireConfig,
    sources: Vec<Box<dyn ActionSource>>,
    cache: Option<Arc<dyn ToolDescriptionCacheProvider>>,
    resources: Vec<McpResource>,
    prompts: Vec<McpPrompt>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ToolwireConfig::default(),
            sources: Vec::new(),
            cache: None,
            resources: Vec::new(),
            prompts: Vec::new(),
        }
    }

    pub fn config(mut self, config: ToolwireConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.server.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.server.version = version.into();
        self
    }

    /// Add an action source to discover tools from
    pub fn with_source(mut self, source: impl ActionSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Use this cache instead of the one described by the configuration
    pub fn with_cache(mut self, cache: Arc<dyn ToolDescriptionCacheProvider>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_resource(mut self, resource: McpResource) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_prompt(mut self, prompt: McpPrompt) -> Self {
        self.prompts.push(prompt);
        self
    }

    /// Discover tools and assemble the server.
    ///
    /// Individual tools that fail to build are logged and left out; only an
    /// invalid configuration fails the build.
    pub async fn build(self) -> Result<McpServer> {
        let config = self.config;
        config.validate()?;

        let cache = match self.cache {
            Some(cache) => cache,
            None => open_cache(&config.descriptions.cache).await,
        };

        let builder = MethodToolBuilder::new(Arc::new(config.descriptions.curated_table()))
            .with_cache(cache, config.descriptions.provider_model.clone());
        let discovery = ToolDiscoveryService::new(builder);

        let sources: Vec<&dyn ActionSource> = self.sources.iter().map(|s| s.as_ref()).collect();
        let report = discovery.discover(&sources);
        if !report.failures.is_empty() {
            tracing::warn!(
                failed = report.failures.len(),
                "Some tools were left out of the registry"
            );
        }

        let executor = ToolExecutor::new(Arc::new(report.registry), config.executor.clone());
        let handler = JsonRpcHandler::new(
            ServerInfo {
                name: config.server.name.clone(),
                version: config.server.version.clone(),
            },
            executor,
            Arc::new(discovery.into_builder()),
        )
        .with_resources(self.resources)
        .with_prompts(self.prompts)
        .with_execution_defaults(config.execution.parameters());

        Ok(McpServer::from_handler(handler))
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Open the configured cache. A file store that cannot be opened falls back
/// to memory so startup never fails on the cache.
async fn open_cache(config: &DescriptionCacheConfig) -> Arc<dyn ToolDescriptionCacheProvider> {
    match config {
        DescriptionCacheConfig::Memory => {
            Arc::new(StoreCacheProvider::new(Arc::new(InMemoryDescriptionStore::new())))
        }
        DescriptionCacheConfig::File { path } => match FileDescriptionStore::open(path).await {
            Ok(store) => {
                tracing::debug!(path = %path.display(), "Opened description cache");
                Arc::new(StoreCacheProvider::new(Arc::new(store)))
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Description cache unavailable, using in-memory cache"
                );
                Arc::new(StoreCacheProvider::new(Arc::new(InMemoryDescriptionStore::new())))
            }
        },
    }
}

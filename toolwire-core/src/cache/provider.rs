//! The description cache contract and its store-backed implementation

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::task::TaskTracker;

use super::CacheError;
use super::store::{DescriptionStore, ToolDescription};

/// Cache of generated tool descriptions keyed by (provider model, tool name).
///
/// `lookup` never generates anything. `record_usage` returns immediately and
/// never fails the caller.
#[async_trait]
pub trait ToolDescriptionCacheProvider: Send + Sync {
    /// Cached description, or `None` on a miss or any storage failure
    async fn lookup(&self, provider_model: &str, tool_name: &str) -> Option<String>;

    /// Store a freshly generated description (upsert, last write wins)
    async fn store(
        &self,
        provider_model: &str,
        tool_name: &str,
        description: &str,
        generation_time_ms: u64,
    ) -> Result<(), CacheError>;

    /// Store a full record including parameter and annotation snapshots
    async fn store_record(&self, record: ToolDescription) -> Result<(), CacheError> {
        self.store(
            &record.provider_model,
            &record.tool_name,
            &record.description,
            record.generation_time_ms,
        )
        .await
    }

    /// Note a successful invocation. Fire-and-forget.
    fn record_usage(&self, provider_model: &str, tool_name: &str);
}

/// Adapts a [`DescriptionStore`] to the cache contract
pub struct StoreCacheProvider {
    store: Arc<dyn DescriptionStore>,
    usage_tasks: TaskTracker,
}

impl StoreCacheProvider {
    /// Create a provider over the given store
    pub fn new(store: Arc<dyn DescriptionStore>) -> Self {
        Self {
            store,
            usage_tasks: TaskTracker::new(),
        }
    }

    /// The underlying store
    pub fn store_handle(&self) -> &Arc<dyn DescriptionStore> {
        &self.store
    }

    /// Wait for in-flight usage updates to land
    pub async fn flush(&self) {
        self.usage_tasks.close();
        self.usage_tasks.wait().await;
        self.usage_tasks.reopen();
    }
}

#[async_trait]
impl ToolDescriptionCacheProvider for StoreCacheProvider {
    async fn lookup(&self, provider_model: &str, tool_name: &str) -> Option<String> {
        match self.store.get(provider_model, tool_name).await {
            Ok(row) => row.map(|r| r.description),
            Err(e) => {
                tracing::warn!(
                    provider_model = %provider_model,
                    tool = %tool_name,
                    error = %e,
                    "Description cache lookup failed, treating as miss"
                );
                None
            }
        }
    }

    async fn store(
        &self,
        provider_model: &str,
        tool_name: &str,
        description: &str,
        generation_time_ms: u64,
    ) -> Result<(), CacheError> {
        self.store_record(ToolDescription::new(
            provider_model,
            tool_name,
            description,
            generation_time_ms,
        ))
        .await
    }

    async fn store_record(&self, record: ToolDescription) -> Result<(), CacheError> {
        let provider_model = record.provider_model.clone();
        let tool_name = record.tool_name.clone();
        self.store.upsert(record).await.inspect_err(|e| {
            tracing::warn!(
                provider_model = %provider_model,
                tool = %tool_name,
                error = %e,
                "Failed to store tool description"
            );
        })
    }

    fn record_usage(&self, provider_model: &str, tool_name: &str) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(tool = %tool_name, "No runtime available, dropping usage update");
            return;
        };

        let store = Arc::clone(&self.store);
        let provider_model = provider_model.to_string();
        let tool_name = tool_name.to_string();
        self.usage_tasks.spawn_on(
            async move {
                match store.increment_usage(&provider_model, &tool_name).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::trace!(tool = %tool_name, "No cached description to record usage against")
                    }
                    Err(e) => tracing::warn!(
                        provider_model = %provider_model,
                        tool = %tool_name,
                        error = %e,
                        "Failed to record tool usage"
                    ),
                }
            },
            &runtime,
        );
    }
}

/// A cache that never hits and never stores
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheProvider;

#[async_trait]
impl ToolDescriptionCacheProvider for NoopCacheProvider {
    async fn lookup(&self, _provider_model: &str, _tool_name: &str) -> Option<String> {
        None
    }

    async fn store(
        &self,
        _provider_model: &str,
        _tool_name: &str,
        _description: &str,
        _generation_time_ms: u64,
    ) -> Result<(), CacheError> {
        Ok(())
    }

    fn record_usage(&self, _provider_model: &str, _tool_name: &str) {}
}

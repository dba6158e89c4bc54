//! Background generation of missing descriptions
//!
//! Tools that ended up with a humanized fallback description are looked up
//! in the cache; on a miss an external generator is asked for a description,
//! which is timed and stored for the next boot.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use super::provider::ToolDescriptionCacheProvider;
use super::store::ToolDescription;
use crate::error::Result;
use crate::tools::{DescriptionSource, Tool, ToolRegistry};

/// Produces a description for a tool (typically backed by a language model)
#[async_trait]
pub trait DescriptionGenerator: Send + Sync {
    /// Generate a description for the tool
    async fn generate(&self, tool: &Tool) -> Result<String>;
}

/// Counts from one backfill run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Tools with explicit or curated descriptions
    pub skipped: usize,
    /// Humanized tools already present in the cache
    pub cached: usize,
    /// Descriptions generated and stored
    pub generated: usize,
    /// Generation or storage failures
    pub failed: usize,
}

/// Fills the description cache for humanized tools
pub struct DescriptionBackfill {
    cache: Arc<dyn ToolDescriptionCacheProvider>,
    generator: Arc<dyn DescriptionGenerator>,
    provider_model: String,
}

impl DescriptionBackfill {
    pub fn new(
        cache: Arc<dyn ToolDescriptionCacheProvider>,
        generator: Arc<dyn DescriptionGenerator>,
        provider_model: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            generator,
            provider_model: provider_model.into(),
        }
    }

    /// Walk the registry once
    pub async fn run(&self, registry: &ToolRegistry) -> BackfillReport {
        let mut report = BackfillReport::default();

        for tool in registry.tools() {
            if tool.description_source != DescriptionSource::Humanized {
                report.skipped += 1;
                continue;
            }
            if self.cache.lookup(&self.provider_model, &tool.name).await.is_some() {
                report.cached += 1;
                continue;
            }

            let started = Instant::now();
            let description = match self.generator.generate(tool).await {
                Ok(description) if !description.trim().is_empty() => description,
                Ok(_) => {
                    tracing::warn!(tool = %tool.name, "Generator returned an empty description");
                    report.failed += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(tool = %tool.name, error = %e, "Description generation failed");
                    report.failed += 1;
                    continue;
                }
            };
            let generation_time_ms = started.elapsed().as_millis() as u64;

            let mut record = ToolDescription::new(
                &self.provider_model,
                &tool.name,
                description.trim(),
                generation_time_ms,
            );
            if let Ok(parameters) = serde_json::to_string(&tool.input_schema) {
                record = record.with_parameters_json(parameters);
            }
            if let Ok(annotations) = serde_json::to_string(&tool.annotations) {
                record = record.with_annotations_json(annotations);
            }

            match self.cache.store_record(record).await {
                Ok(()) => {
                    tracing::debug!(tool = %tool.name, generation_time_ms, "Stored generated description");
                    report.generated += 1;
                }
                Err(_) => report.failed += 1,
            }
        }

        tracing::info!(
            provider_model = %self.provider_model,
            generated = report.generated,
            cached = report.cached,
            failed = report.failed,
            "Description backfill complete"
        );
        report
    }
}

//! Tool discovery over registered action sources
//!
//! Every source is asked for its methods once at startup. Each method is
//! built independently: a malformed method is logged and left out, and
//! discovery always completes with whatever tools could be built.

use std::time::{Duration, Instant};
use thiserror::Error;

use super::builder::MethodToolBuilder;
use super::registry::ToolRegistry;
use super::tool::ActionSource;
use crate::schema::SchemaError;

/// Why a single method was left out of the registry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DiscoveryError {
    #[error("{origin}: invalid tool name '{name}': {reason}")]
    InvalidName {
        origin: String,
        name: String,
        reason: String,
    },

    #[error("{origin}: tool '{tool}' has an invalid parameter declaration: {error}")]
    Schema {
        origin: String,
        tool: String,
        #[source]
        error: SchemaError,
    },

    #[error("{origin}: tool '{tool}' declares a zero timeout")]
    InvalidTimeout { origin: String, tool: String },

    #[error("{origin}: tool '{tool}' is already registered")]
    Duplicate { origin: String, tool: String },
}

/// Outcome of a discovery run
#[derive(Debug)]
pub struct DiscoveryReport {
    /// Tools that were built and registered
    pub registry: ToolRegistry,

    /// Methods that were left out
    pub failures: Vec<DiscoveryError>,

    /// Methods skipped because they are disabled
    pub disabled: usize,

    /// Wall time spent
    pub elapsed: Duration,
}

/// Enumerates action sources into a [`ToolRegistry`]
#[derive(Debug, Default)]
pub struct ToolDiscoveryService {
    builder: MethodToolBuilder,
}

impl ToolDiscoveryService {
    /// Create a discovery service using the given builder
    pub fn new(builder: MethodToolBuilder) -> Self {
        Self { builder }
    }

    /// The builder in use
    pub fn builder(&self) -> &MethodToolBuilder {
        &self.builder
    }

    /// Give the builder back, e.g. to resolve descriptions later
    pub fn into_builder(self) -> MethodToolBuilder {
        self.builder
    }

    /// Discover every enabled method of every source
    pub fn discover(&self, sources: &[&dyn ActionSource]) -> DiscoveryReport {
        let started = Instant::now();
        let mut registry = ToolRegistry::new();
        let mut failures = Vec::new();
        let mut disabled = 0;

        for source in sources {
            let origin = source.source_name();
            for method in source.actions() {
                if !method.annotations.enabled {
                    tracing::debug!(
                        source = %origin,
                        method = %method.method_name,
                        "Skipping disabled action"
                    );
                    disabled += 1;
                    continue;
                }

                let result = self.builder.build(origin, method).and_then(|tool| {
                    let name = tool.name().to_string();
                    registry
                        .register(tool)
                        .map_err(|_| DiscoveryError::Duplicate {
                            origin: origin.to_string(),
                            tool: name.clone(),
                        })?;
                    Ok(name)
                });

                match result {
                    Ok(name) => tracing::trace!(source = %origin, tool = %name, "Registered tool"),
                    Err(error) => {
                        tracing::warn!(source = %origin, error = %error, "Skipping action");
                        failures.push(error);
                    }
                }
            }
        }

        let elapsed = started.elapsed();
        tracing::info!(
            sources = sources.len(),
            tools = registry.len(),
            skipped = failures.len(),
            disabled,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "Tool discovery complete"
        );

        DiscoveryReport {
            registry,
            failures,
            disabled,
            elapsed,
        }
    }
}

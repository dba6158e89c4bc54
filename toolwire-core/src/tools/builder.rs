//! Turns declared action methods into registered tools
//!
//! Descriptions resolve by precedence: explicit on the method, then the
//! curated table, then the description cache (only on demand through
//! [`MethodToolBuilder::resolve_description`]), then a humanized form of the
//! method name. `build` itself never touches the cache.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::discovery::DiscoveryError;
use super::tool::{ActionMethod, DescriptionSource, RegisteredTool, Tool};
use crate::cache::ToolDescriptionCacheProvider;
use crate::schema::SchemaGenerator;

/// Longest accepted tool name
pub const MAX_TOOL_NAME_LEN: usize = 64;

/// Curated descriptions keyed by tool name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptionTable {
    entries: HashMap<String, String>,
}

impl DescriptionTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn with_entry(mut self, tool_name: impl Into<String>, description: impl Into<String>) -> Self {
        self.entries.insert(tool_name.into(), description.into());
        self
    }

    /// Description for a tool, if curated
    pub fn get(&self, tool_name: &str) -> Option<&str> {
        self.entries.get(tool_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<HashMap<String, String>> for DescriptionTable {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Builds [`RegisteredTool`]s from [`ActionMethod`]s
pub struct MethodToolBuilder {
    generator: SchemaGenerator,
    curated: Arc<DescriptionTable>,
    cache: Option<Arc<dyn ToolDescriptionCacheProvider>>,
    provider_model: String,
}

impl std::fmt::Debug for MethodToolBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodToolBuilder")
            .field("curated", &self.curated.len())
            .field("cache", &self.cache.is_some())
            .field("provider_model", &self.provider_model)
            .finish()
    }
}

impl Default for MethodToolBuilder {
    fn default() -> Self {
        Self::new(Arc::new(DescriptionTable::default()))
    }
}

impl MethodToolBuilder {
    /// Create a builder over the given curated table
    pub fn new(curated: Arc<DescriptionTable>) -> Self {
        Self {
            generator: SchemaGenerator::new(),
            curated,
            cache: None,
            provider_model: String::new(),
        }
    }

    /// Attach a description cache for the given provider model
    pub fn with_cache(
        mut self,
        cache: Arc<dyn ToolDescriptionCacheProvider>,
        provider_model: impl Into<String>,
    ) -> Self {
        self.cache = Some(cache);
        self.provider_model = provider_model.into();
        self
    }

    /// Provider model used for cache keys
    pub fn provider_model(&self) -> &str {
        &self.provider_model
    }

    /// The attached cache, if any
    pub fn cache(&self) -> Option<&Arc<dyn ToolDescriptionCacheProvider>> {
        self.cache.as_ref()
    }

    /// Build a tool from one method. Performs no I/O.
    pub fn build(&self, origin: &str, method: ActionMethod) -> Result<RegisteredTool, DiscoveryError> {
        let name = method.tool_name().trim().to_string();
        validate_tool_name(&name).map_err(|reason| DiscoveryError::InvalidName {
            origin: origin.to_string(),
            name: name.clone(),
            reason,
        })?;

        if method.annotations.timeout_ms == Some(0) {
            return Err(DiscoveryError::InvalidTimeout {
                origin: origin.to_string(),
                tool: name,
            });
        }

        let generated = self
            .generator
            .generate(&method.params)
            .map_err(|error| DiscoveryError::Schema {
                origin: origin.to_string(),
                tool: name.clone(),
                error,
            })?;

        let (description, description_source) = self.static_description(&name, &method);

        Ok(RegisteredTool {
            tool: Tool {
                name,
                description,
                input_schema: generated.schema,
                annotations: method.annotations,
                description_source,
            },
            layout: generated.layout,
            handler: method.handler,
            origin: origin.to_string(),
        })
    }

    fn static_description(&self, name: &str, method: &ActionMethod) -> (String, DescriptionSource) {
        if let Some(description) = method
            .description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
        {
            return (description.to_string(), DescriptionSource::Explicit);
        }
        if let Some(description) = self.curated.get(name) {
            return (description.to_string(), DescriptionSource::Curated);
        }
        (humanize(&method.method_name), DescriptionSource::Humanized)
    }

    /// Refresh a humanized description from the cache.
    ///
    /// Explicit and curated descriptions are returned unchanged. A cache
    /// miss (or no cache) keeps the humanized fallback.
    pub async fn resolve_description(&self, tool: &Tool) -> Tool {
        if tool.description_source != DescriptionSource::Humanized {
            return tool.clone();
        }
        let Some(cache) = &self.cache else {
            return tool.clone();
        };
        match cache.lookup(&self.provider_model, &tool.name).await {
            Some(description) => tool.with_description(description, DescriptionSource::Cached),
            None => tool.clone(),
        }
    }
}

fn validate_tool_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("name cannot be empty".to_string());
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(format!("name exceeds {} characters", MAX_TOOL_NAME_LEN));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(format!("invalid character '{}'", c));
    }
    Ok(())
}

/// Human-readable form of a method name.
///
/// `searchResumes` and `search_resumes` both become `search resumes`;
/// acronyms stay together (`openURL` becomes `open url`).
pub fn humanize(method_name: &str) -> String {
    let chars: Vec<char> = method_name.trim().chars().collect();
    let mut out = String::with_capacity(chars.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 && !out.is_empty() && !out.ends_with(' ') {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower) {
                out.push(' ');
            }
        }
        out.extend(c.to_lowercase());
    }

    out.trim_end().to_string()
}

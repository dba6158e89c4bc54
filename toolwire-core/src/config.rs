//! Configuration types for the Toolwire runtime

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ToolwireError};
use crate::execution::{
    DEFAULT_SETUP_BUFFER, ExecutionParameters, MIN_STEP_TIMEOUT_SECONDS,
};
use crate::tools::{DescriptionTable, ToolExecutorConfig};

/// Main configuration for a Toolwire server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolwireConfig {
    /// Identity reported to clients
    pub server: ServerConfig,

    /// Tool invocation limits
    pub executor: ToolExecutorConfig,

    /// Description sources and caching
    pub descriptions: DescriptionsConfig,

    /// Defaults for multi-step tasks
    pub execution: ExecutionDefaults,
}

/// Server identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "toolwire".to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

/// Where tool descriptions come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptionsConfig {
    /// Model whose generated descriptions are cached and served
    pub provider_model: String,

    /// Hand-written descriptions keyed by tool name
    pub curated: HashMap<String, String>,

    /// Description cache backend
    pub cache: DescriptionCacheConfig,
}

impl Default for DescriptionsConfig {
    fn default() -> Self {
        Self {
            provider_model: "default".to_string(),
            curated: HashMap::new(),
            cache: DescriptionCacheConfig::default(),
        }
    }
}

impl DescriptionsConfig {
    /// The curated table in the form the tool builder consumes
    pub fn curated_table(&self) -> DescriptionTable {
        DescriptionTable::from(self.curated.clone())
    }
}

/// Description cache backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DescriptionCacheConfig {
    /// Process-local, lost on restart
    Memory,

    /// JSON file persisted across restarts
    File {
        /// Location of the cache file
        path: PathBuf,
    },
}

impl Default for DescriptionCacheConfig {
    fn default() -> Self {
        DescriptionCacheConfig::File {
            path: default_cache_path(),
        }
    }
}

/// Default cache file under the platform data directory
pub fn default_cache_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("./data"))
        .join("toolwire")
        .join("tool_descriptions.json")
}

/// Defaults applied to tasks that do not bring their own parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionDefaults {
    /// Step ceiling for multi-step tasks
    pub default_max_steps: u32,

    pub step_timeout_seconds: u64,

    /// Confidence at which AUTO tasks may stop
    pub early_completion_threshold: f64,

    /// Allowance added to the step budget for task setup
    #[serde(with = "humantime_serde")]
    pub setup_buffer: Duration,
}

impl Default for ExecutionDefaults {
    fn default() -> Self {
        Self {
            default_max_steps: 10,
            step_timeout_seconds: 30,
            early_completion_threshold: 0.8,
            setup_buffer: DEFAULT_SETUP_BUFFER,
        }
    }
}

impl ExecutionDefaults {
    /// MULTI_STEP parameters built from these defaults
    pub fn parameters(&self) -> ExecutionParameters {
        ExecutionParameters::multi_step(self.default_max_steps)
            .with_step_timeout_seconds(self.step_timeout_seconds)
            .with_threshold(self.early_completion_threshold)
            .with_setup_buffer(self.setup_buffer)
    }
}

impl ToolwireConfig {
    /// Load configuration from files and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `toolwire.toml` in the working directory
    /// 3. The file named by `TOOLWIRE_CONFIG_PATH`
    /// 4. `TOOLWIRE_` environment variables, `__` separating nested keys
    ///    (`TOOLWIRE_EXECUTOR__MAX_CONCURRENT_INVOCATIONS=8`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is invalid or the merged
    /// configuration fails validation.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Toml},
        };

        let mut figment = Figment::new().merge(Toml::file("toolwire.toml"));

        if let Ok(path) = std::env::var("TOOLWIRE_CONFIG_PATH") {
            figment = Self::merge_file(figment, Path::new(&path));
        }

        let config: ToolwireConfig = figment
            .merge(Env::prefixed("TOOLWIRE_").split("__").ignore(&["config_path"]))
            .extract()
            .map_err(|e| ToolwireError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// The format follows the extension: `.toml`, `.yaml`/`.yml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or fails
    /// validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        use figment::Figment;

        let path = path.as_ref();
        if !path.exists() {
            return Err(ToolwireError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: ToolwireConfig = Self::merge_file(Figment::new(), path).extract().map_err(|e| {
            ToolwireError::Configuration(format!("Failed to load configuration file: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    fn merge_file(figment: figment::Figment, path: &Path) -> figment::Figment {
        use figment::providers::{Format, Json, Toml, Yaml};

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => figment.merge(Yaml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Toml::file(path)),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ToolwireError::Configuration(msg));

        if self.executor.default_timeout.is_zero() {
            return invalid("executor.default_timeout must be greater than zero".to_string());
        }
        if self.executor.max_concurrent_invocations == 0 {
            return invalid("executor.max_concurrent_invocations must be at least 1".to_string());
        }
        if self.descriptions.provider_model.trim().is_empty() {
            return invalid("descriptions.provider_model must not be empty".to_string());
        }
        if self.execution.default_max_steps == 0 {
            return invalid("execution.default_max_steps must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.execution.early_completion_threshold) {
            return invalid(format!(
                "execution.early_completion_threshold must be within [0, 1], got {}",
                self.execution.early_completion_threshold
            ));
        }
        if self.execution.step_timeout_seconds < MIN_STEP_TIMEOUT_SECONDS {
            return invalid(format!(
                "execution.step_timeout_seconds must be at least {}, got {}",
                MIN_STEP_TIMEOUT_SECONDS, self.execution.step_timeout_seconds
            ));
        }
        Ok(())
    }
}

//! Error types for Toolwire operations

/// Result type for Toolwire operations
pub type Result<T> = std::result::Result<T, ToolwireError>;

/// Error types for the Toolwire runtime
#[derive(Debug, thiserror::Error)]
pub enum ToolwireError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Tool registry error
    #[error("Registry error: {0}")]
    Registry(#[from] crate::tools::RegistryError),

    /// Description cache error
    #[error("Cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),

    /// Transport failure (stdio, in-memory, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single incoming frame could not be decoded; the stream is still usable
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ToolwireError {
    fn from(s: String) -> Self {
        ToolwireError::Other(s)
    }
}

impl From<&str> for ToolwireError {
    fn from(s: &str) -> Self {
        ToolwireError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for ToolwireError {
    fn from(err: anyhow::Error) -> Self {
        ToolwireError::Other(err.to_string())
    }
}

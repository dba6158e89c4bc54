//! Tool description cache
//!
//! Generated descriptions are expensive to produce, so they are cached per
//! (provider model, tool name) and reused across restarts. Lookups happen on
//! demand (never during discovery), usage statistics are updated in the
//! background, and any storage failure degrades to a cache miss.

mod backfill;
mod provider;
mod store;

pub use backfill::{BackfillReport, DescriptionBackfill, DescriptionGenerator};
pub use provider::{NoopCacheProvider, StoreCacheProvider, ToolDescriptionCacheProvider};
pub use store::{DescriptionStore, FileDescriptionStore, InMemoryDescriptionStore, ToolDescription};

use std::path::PathBuf;
use thiserror::Error;

/// Description cache failures
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("cache storage unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

//! Description storage backends

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

use super::CacheError;

/// A cached description for one (provider model, tool) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescription {
    pub provider_model: String,
    pub tool_name: String,
    pub description: String,

    /// Serialized input schema at generation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_json: Option<String>,

    /// Serialized annotations at generation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations_json: Option<String>,

    pub generation_time_ms: u64,

    /// Number of successful invocations recorded; never decreases
    #[serde(default)]
    pub usage_count: u64,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ToolDescription {
    /// Create a fresh record
    pub fn new(
        provider_model: impl Into<String>,
        tool_name: impl Into<String>,
        description: impl Into<String>,
        generation_time_ms: u64,
    ) -> Self {
        Self {
            provider_model: provider_model.into(),
            tool_name: tool_name.into(),
            description: description.into(),
            parameters_json: None,
            annotations_json: None,
            generation_time_ms,
            usage_count: 0,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    /// Attach the serialized parameter info
    pub fn with_parameters_json(mut self, parameters_json: impl Into<String>) -> Self {
        self.parameters_json = Some(parameters_json.into());
        self
    }

    /// Attach the serialized annotation info
    pub fn with_annotations_json(mut self, annotations_json: impl Into<String>) -> Self {
        self.annotations_json = Some(annotations_json.into());
        self
    }

    fn key(&self) -> CacheKey {
        CacheKey::new(&self.provider_model, &self.tool_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider_model: String,
    tool_name: String,
}

impl CacheKey {
    fn new(provider_model: &str, tool_name: &str) -> Self {
        Self {
            provider_model: provider_model.to_string(),
            tool_name: tool_name.to_string(),
        }
    }
}

/// Storage backend for cached descriptions.
///
/// Rows are unique per (provider model, tool name). `upsert` replaces the
/// text and generation info of an existing row but keeps its `usage_count`
/// and `created_at`.
#[async_trait]
pub trait DescriptionStore: Send + Sync {
    /// Fetch one row
    async fn get(&self, provider_model: &str, tool_name: &str) -> Result<Option<ToolDescription>, CacheError>;

    /// Insert or update a row
    async fn upsert(&self, record: ToolDescription) -> Result<(), CacheError>;

    /// Bump the usage counter and `last_used_at`. Returns `false` if there
    /// is no such row.
    async fn increment_usage(&self, provider_model: &str, tool_name: &str) -> Result<bool, CacheError>;

    /// All rows
    async fn list(&self) -> Result<Vec<ToolDescription>, CacheError>;
}

struct MemoryEntry {
    record: ToolDescription,
    usage_count: AtomicU64,
    last_used_at: std::sync::Mutex<Option<DateTime<Utc>>>,
}

impl MemoryEntry {
    fn new(record: ToolDescription) -> Self {
        Self {
            usage_count: AtomicU64::new(record.usage_count),
            last_used_at: std::sync::Mutex::new(record.last_used_at),
            record,
        }
    }

    fn snapshot(&self) -> ToolDescription {
        let mut record = self.record.clone();
        record.usage_count = self.usage_count.load(Ordering::SeqCst);
        record.last_used_at = self.last_used_at.lock().map(|t| *t).unwrap_or(record.last_used_at);
        record
    }

    fn touch(&self) {
        self.usage_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last_used_at) = self.last_used_at.lock() {
            *last_used_at = Some(Utc::now());
        }
    }
}

/// In-memory description storage
pub struct InMemoryDescriptionStore {
    entries: Arc<RwLock<HashMap<CacheKey, Arc<MemoryEntry>>>>,
}

impl InMemoryDescriptionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryDescriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DescriptionStore for InMemoryDescriptionStore {
    async fn get(&self, provider_model: &str, tool_name: &str) -> Result<Option<ToolDescription>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&CacheKey::new(provider_model, tool_name))
            .map(|entry| entry.snapshot()))
    }

    async fn upsert(&self, record: ToolDescription) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        let key = record.key();
        let merged = match entries.get(&key) {
            Some(existing) => merge(existing.snapshot(), record),
            None => record,
        };
        entries.insert(key, Arc::new(MemoryEntry::new(merged)));
        Ok(())
    }

    async fn increment_usage(&self, provider_model: &str, tool_name: &str) -> Result<bool, CacheError> {
        let entries = self.entries.read().await;
        match entries.get(&CacheKey::new(provider_model, tool_name)) {
            Some(entry) => {
                entry.touch();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self) -> Result<Vec<ToolDescription>, CacheError> {
        let entries = self.entries.read().await;
        Ok(entries.values().map(|entry| entry.snapshot()).collect())
    }
}

/// Keep identity and usage of the existing row, take everything else from the update
fn merge(existing: ToolDescription, update: ToolDescription) -> ToolDescription {
    ToolDescription {
        usage_count: existing.usage_count,
        created_at: existing.created_at,
        last_used_at: existing.last_used_at,
        ..update
    }
}

/// Description storage persisted as a JSON file.
///
/// The whole table is held in memory and rewritten on every change, first
/// to a sibling temp file which is then renamed over the original.
pub struct FileDescriptionStore {
    path: PathBuf,
    entries: Mutex<HashMap<CacheKey, ToolDescription>>,
}

impl FileDescriptionStore {
    /// Open the store, loading existing rows if the file exists
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => {
                let records: Vec<ToolDescription> =
                    serde_json::from_slice(&bytes).map_err(|e| CacheError::Corrupt {
                        path: path.clone(),
                        reason: e.to_string(),
                    })?;
                records.into_iter().map(|r| (r.key(), r)).collect()
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), rows = entries.len(), "Opened description cache");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `record` through to disk. Memory keeps the previous row unless
    /// the write succeeds.
    async fn commit(
        &self,
        entries: &mut HashMap<CacheKey, ToolDescription>,
        key: CacheKey,
        record: ToolDescription,
    ) -> Result<(), CacheError> {
        let previous = entries.insert(key.clone(), record);
        if let Err(e) = self.persist(entries).await {
            match previous {
                Some(previous) => entries.insert(key, previous),
                None => entries.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn persist(&self, entries: &HashMap<CacheKey, ToolDescription>) -> Result<(), CacheError> {
        let mut records: Vec<&ToolDescription> = entries.values().collect();
        records.sort_by(|a, b| {
            (a.provider_model.as_str(), a.tool_name.as_str())
                .cmp(&(b.provider_model.as_str(), b.tool_name.as_str()))
        });
        let bytes = serde_json::to_vec_pretty(&records)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl DescriptionStore for FileDescriptionStore {
    async fn get(&self, provider_model: &str, tool_name: &str) -> Result<Option<ToolDescription>, CacheError> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&CacheKey::new(provider_model, tool_name)).cloned())
    }

    async fn upsert(&self, record: ToolDescription) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().await;
        let key = record.key();
        let merged = match entries.get(&key) {
            Some(existing) => merge(existing.clone(), record),
            None => record,
        };
        self.commit(&mut entries, key, merged).await
    }

    async fn increment_usage(&self, provider_model: &str, tool_name: &str) -> Result<bool, CacheError> {
        let mut entries = self.entries.lock().await;
        let key = CacheKey::new(provider_model, tool_name);
        let Some(mut record) = entries.get(&key).cloned() else {
            return Ok(false);
        };
        record.usage_count += 1;
        record.last_used_at = Some(Utc::now());
        self.commit(&mut entries, key, record).await?;
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<ToolDescription>, CacheError> {
        let entries = self.entries.lock().await;
        Ok(entries.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_upsert_preserves_usage() {
        let store = InMemoryDescriptionStore::new();
        store
            .upsert(ToolDescription::new("m", "search", "first", 10))
            .await
            .unwrap();
        let created_at = store.get("m", "search").await.unwrap().unwrap().created_at;

        assert!(store.increment_usage("m", "search").await.unwrap());
        assert!(store.increment_usage("m", "search").await.unwrap());

        store
            .upsert(ToolDescription::new("m", "search", "second", 20))
            .await
            .unwrap();

        let row = store.get("m", "search").await.unwrap().unwrap();
        assert_eq!(row.description, "second");
        assert_eq!(row.generation_time_ms, 20);
        assert_eq!(row.usage_count, 2);
        assert_eq!(row.created_at, created_at);
        assert!(row.last_used_at.is_some());
    }

    #[tokio::test]
    async fn test_memory_keys_are_per_model() {
        let store = InMemoryDescriptionStore::new();
        store.upsert(ToolDescription::new("a", "search", "from a", 1)).await.unwrap();
        store.upsert(ToolDescription::new("b", "search", "from b", 1)).await.unwrap();

        assert_eq!(store.get("a", "search").await.unwrap().unwrap().description, "from a");
        assert_eq!(store.get("b", "search").await.unwrap().unwrap().description, "from b");
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert!(!store.increment_usage("c", "search").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_concurrent_increments() {
        let store = Arc::new(InMemoryDescriptionStore::new());
        store.upsert(ToolDescription::new("m", "t", "d", 1)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.increment_usage("m", "t").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get("m", "t").await.unwrap().unwrap().usage_count, 50);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("descriptions.json");

        let store = FileDescriptionStore::open(&path).await.unwrap();
        store
            .upsert(
                ToolDescription::new("m", "openPage", "Open a page", 42)
                    .with_parameters_json("{\"type\":\"object\"}"),
            )
            .await
            .unwrap();
        store.increment_usage("m", "openPage").await.unwrap();
        drop(store);

        let reopened = FileDescriptionStore::open(&path).await.unwrap();
        let row = reopened.get("m", "openPage").await.unwrap().unwrap();
        assert_eq!(row.description, "Open a page");
        assert_eq!(row.usage_count, 1);
        assert_eq!(row.parameters_json.as_deref(), Some("{\"type\":\"object\"}"));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_failed_write_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("descriptions.json");
        let store = FileDescriptionStore::open(&path).await.unwrap();
        store.upsert(ToolDescription::new("m", "search", "Search", 5)).await.unwrap();

        // A directory squatting on the temp path makes every write fail
        let blocker = path.with_extension("json.tmp");
        tokio::fs::create_dir(&blocker).await.unwrap();

        assert!(store.increment_usage("m", "search").await.is_err());
        assert!(store.upsert(ToolDescription::new("m", "scroll", "Scroll", 3)).await.is_err());
        assert_eq!(store.get("m", "search").await.unwrap().unwrap().usage_count, 0);
        assert!(store.get("m", "scroll").await.unwrap().is_none());

        tokio::fs::remove_dir(&blocker).await.unwrap();
        assert!(store.increment_usage("m", "search").await.unwrap());

        let reopened = FileDescriptionStore::open(&path).await.unwrap();
        assert_eq!(reopened.get("m", "search").await.unwrap().unwrap().usage_count, 1);
        assert!(reopened.get("m", "scroll").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("descriptions.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = FileDescriptionStore::open(&path).await.err().unwrap();
        assert!(matches!(err, CacheError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDescriptionStore::open(dir.path().join("none.json")).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}

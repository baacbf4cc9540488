use thiserror::Error;

use crate::entry::CacheEntry;
use crate::key::KeyPattern;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Serialization failed for '{key}': {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Quota exceeded: {needed} bytes needed, {quota} bytes allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Short label for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serialization { .. } => "serialization",
            Self::QuotaExceeded { .. } => "quota",
            Self::Io(_) => "io",
        }
    }
}

/// One backing store of cache entries, addressed by fully composed keys.
///
/// Implementations only store; freshness decisions belong to the caller,
/// except in [`cleanup_expired`](Tier::cleanup_expired).
pub trait Tier<V>: Send + Sync {
    /// Name used in stats, logs and metric labels.
    fn name(&self) -> &str;

    fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>, StorageError>;

    fn set(&self, key: &str, entry: &CacheEntry<V>) -> Result<(), StorageError>;

    /// Returns whether the key was present.
    fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    fn clear(&self, prefix: &str) -> Result<usize, StorageError>;

    /// Remove every key matching `pattern`. Returns the number removed.
    fn delete_by_pattern(&self, pattern: &KeyPattern) -> Result<usize, StorageError>;

    fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Remove entries under `prefix` that are expired at `now_ms` (or
    /// unreadable). Returns the number removed.
    fn cleanup_expired(&self, prefix: &str, now_ms: u64) -> Result<usize, StorageError>;

    fn count_by_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        Ok(self.list_keys_by_prefix(prefix)?.len())
    }
}

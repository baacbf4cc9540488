use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::surface::{check_quota, item_size, KeyValueSurface};
use super::traits::StorageError;

/// Process-lifetime surface backed by a concurrent map.
///
/// Share one instance (via `Arc`) between managers to model a storage area
/// that every cache in the process sees. Keys are partitioned only by the
/// managers' prefixes.
pub struct SessionSurface {
    data: DashMap<String, String>,
    used_bytes: AtomicUsize,
    quota_bytes: Option<usize>,
    /// Serializes quota check + write so concurrent writers cannot overshoot.
    write_lock: Mutex<()>,
}

impl SessionSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::with_quota(None)
    }

    #[must_use]
    pub fn with_quota(quota_bytes: Option<usize>) -> Self {
        Self {
            data: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            quota_bytes,
            write_lock: Mutex::new(()),
        }
    }

    /// Get current item count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Clear all items, whatever their prefix
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.data.clear();
        self.used_bytes.store(0, Ordering::Release);
    }
}

impl Default for SessionSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueSurface for SessionSurface {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.data.get(key).map(|r| r.value().clone()))
    }

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock();
        let old_size = self
            .data
            .get(key)
            .map(|r| item_size(key, r.value()))
            .unwrap_or(0);
        let new_size = item_size(key, &value);
        let used = self.used_bytes.load(Ordering::Acquire);
        check_quota(used, old_size, new_size, self.quota_bytes)?;

        self.data.insert(key.to_string(), value);
        self.used_bytes
            .store(used.saturating_sub(old_size) + new_size, Ordering::Release);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock();
        match self.data.remove(key) {
            Some((key, value)) => {
                self.used_bytes
                    .fetch_sub(item_size(&key, &value), Ordering::AcqRel);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.data.iter().map(|r| r.key().clone()).collect())
    }

    fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Acquire)
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota_bytes
    }
}

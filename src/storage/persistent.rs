//! Entry-level tier over a string key-value surface.
//!
//! Entries are stored as JSON `{"value": .., "expiry": .., "ttl": ..}` under
//! their composed key. A value that fails to parse is a miss, never an error;
//! the sweep removes it.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::surface::KeyValueSurface;
use super::traits::{StorageError, Tier};
use crate::entry::CacheEntry;
use crate::key::KeyPattern;

/// Reads only the expiry of a persisted entry, whatever its value type.
#[derive(Deserialize)]
struct ExpiryProbe {
    expiry: u64,
}

pub struct PersistentTier<V, S: ?Sized = dyn KeyValueSurface> {
    name: String,
    surface: Arc<S>,
    _value: PhantomData<fn() -> V>,
}

impl<V, S: KeyValueSurface + ?Sized> PersistentTier<V, S> {
    pub fn new(name: impl Into<String>, surface: Arc<S>) -> Self {
        Self {
            name: name.into(),
            surface,
            _value: PhantomData,
        }
    }

    /// The underlying surface (shared with any other tier built on it).
    #[must_use]
    pub fn surface(&self) -> &Arc<S> {
        &self.surface
    }

    fn keys_where<F: Fn(&str) -> bool>(&self, keep: F) -> Result<Vec<String>, StorageError> {
        Ok(self
            .surface
            .keys()?
            .into_iter()
            .filter(|key| keep(key))
            .collect())
    }
}

impl<V, S> Tier<V> for PersistentTier<V, S>
where
    V: Serialize + DeserializeOwned,
    S: KeyValueSurface + ?Sized,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry<V>>, StorageError> {
        let Some(raw) = self.surface.get_item(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<CacheEntry<V>>(&raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(tier = %self.name, key = %key, error = %e, "Unreadable entry, treating as miss");
                crate::metrics::record_error(&self.name, "get", "serialization");
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, entry: &CacheEntry<V>) -> Result<(), StorageError> {
        let raw = serde_json::to_string(entry).map_err(|source| StorageError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.surface.set_item(key, raw)
    }

    fn delete(&self, key: &str) -> Result<bool, StorageError> {
        self.surface.remove_item(key)
    }

    fn clear(&self, prefix: &str) -> Result<usize, StorageError> {
        let doomed = self.keys_where(|key| key.starts_with(prefix))?;
        self.surface.remove_items(&doomed)
    }

    fn delete_by_pattern(&self, pattern: &KeyPattern) -> Result<usize, StorageError> {
        let literal = pattern.literal_prefix();
        let doomed = self.keys_where(|key| key.starts_with(literal) && pattern.matches(key))?;
        self.surface.remove_items(&doomed)
    }

    fn list_keys_by_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        self.keys_where(|key| key.starts_with(prefix))
    }

    fn cleanup_expired(&self, prefix: &str, now_ms: u64) -> Result<usize, StorageError> {
        let mut doomed = Vec::new();
        for key in self.keys_where(|key| key.starts_with(prefix))? {
            let Some(raw) = self.surface.get_item(&key)? else {
                continue;
            };
            match serde_json::from_str::<ExpiryProbe>(&raw) {
                Ok(probe) if now_ms < probe.expiry => {}
                Ok(_) => doomed.push(key),
                Err(_) => {
                    debug!(tier = %self.name, key = %key, "Removing unreadable entry");
                    doomed.push(key);
                }
            }
        }
        if doomed.is_empty() {
            return Ok(0);
        }
        self.surface.remove_items(&doomed)
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache manager.
//!
//! The [`CacheManager`] is the only component application code talks to. It
//! ties together:
//! - the bounded memory tier and its eviction tracker
//! - zero or more persistent tiers, probed in order on a memory miss
//! - the namespace policy table
//! - the periodic cleanup scheduler
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use serde_json::json;
//! use tiered_cache::{CacheConfig, CacheManager};
//!
//! let cache: CacheManager = CacheManager::new(CacheConfig::default()).unwrap();
//!
//! cache.set("user:1", json!({"name": "Alice"}), Some(Duration::from_secs(60)), Some("users"));
//! assert_eq!(cache.get("user:1", Some("users")), Some(json!({"name": "Alice"})));
//! assert_eq!(cache.get("user:1", Some("roles")), None);
//! ```

mod types;
mod api;
mod lifecycle;
mod handle;

pub use types::{CacheStats, SchedulerState, WriteReport};
pub use lifecycle::CleanupScheduler;
pub use handle::NamespaceCache;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, TierConfig};
use crate::error::CacheError;
use crate::namespace::NamespaceTable;
use crate::storage::{
    BoundedMemoryTier, FileSurface, KeyValueSurface, PersistentTier, Scope, SessionSurface, Tier,
};

/// Values the manager can cache: cloneable and JSON-serializable.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

#[derive(Default)]
pub(super) struct Counters {
    pub(super) hits: AtomicU64,
    pub(super) misses: AtomicU64,
    pub(super) promotions: AtomicU64,
    pub(super) evictions: AtomicU64,
    pub(super) write_failures: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        for counter in [&self.hits, &self.misses, &self.promotions, &self.evictions, &self.write_failures] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Tiered cache with TTL expiry, bounded memory and namespace isolation.
///
/// # Thread Safety
///
/// The manager is `Send + Sync`; share it through an `Arc`. Every public
/// operation runs to completion under one operation lock, so the periodic
/// sweep only ever runs between operations.
pub struct CacheManager<V = Value> {
    /// When false every operation is a no-op
    pub(super) enabled: bool,

    /// Global key prefix
    pub(super) prefix: String,

    /// Working set, bounded by `max_memory_entries`
    pub(super) memory: BoundedMemoryTier<V>,

    /// Persistent tiers in probe order
    pub(super) tiers: Vec<Arc<dyn Tier<V>>>,

    pub(super) namespaces: NamespaceTable,

    pub(super) clock: Arc<dyn Clock>,

    /// Held for the whole of every public operation
    pub(super) op_lock: Mutex<()>,

    pub(super) counters: Counters,

    pub(super) scheduler: Mutex<CleanupScheduler>,
}

/// Builds a [`CacheManager`] with a custom clock or extra tiers.
pub struct CacheManagerBuilder<V = Value> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    extra_tiers: Vec<Arc<dyn Tier<V>>>,
}

impl<V: CacheValue> CacheManagerBuilder<V> {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            extra_tiers: Vec::new(),
        }
    }

    /// Time source for expiry (tests use [`ManualClock`](crate::ManualClock)).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append a persistent tier after the configured ones.
    #[must_use]
    pub fn tier(mut self, tier: Arc<dyn Tier<V>>) -> Self {
        self.extra_tiers.push(tier);
        self
    }

    /// Append a persistent tier over an existing surface, e.g. one
    /// [`SessionSurface`] shared by several managers.
    #[must_use]
    pub fn surface(self, name: &str, surface: Arc<dyn KeyValueSurface>) -> Self {
        let tier: Arc<dyn Tier<V>> = Arc::new(PersistentTier::<V, dyn KeyValueSurface>::new(name, surface));
        self.tier(tier)
    }

    /// Validate the configuration and open the persistent tiers.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidConfig`] for unusable settings and
    /// [`CacheError::TierOpen`] when a file tier cannot be opened.
    pub fn build(self) -> Result<CacheManager<V>, CacheError> {
        let config = self.config;
        config.validate()?;

        let mut tiers = Vec::new();
        if config.enabled {
            for tier_config in &config.persistent_tiers {
                tiers.push(open_tier::<V>(tier_config)?);
            }
            tiers.extend(self.extra_tiers);
        }

        let tier_names: Vec<&str> = tiers.iter().map(|t| t.name()).collect();
        info!(
            prefix = %config.prefix,
            enabled = config.enabled,
            max_memory_entries = config.max_memory_entries,
            eviction_policy = %config.eviction_policy,
            tiers = ?tier_names,
            "Cache manager ready"
        );

        Ok(CacheManager {
            enabled: config.enabled,
            memory: BoundedMemoryTier::new(config.max_memory_entries, config.eviction_policy),
            tiers,
            namespaces: NamespaceTable::from_config(&config),
            clock: self.clock,
            op_lock: Mutex::new(()),
            counters: Counters::default(),
            scheduler: Mutex::new(CleanupScheduler::new(Duration::from_millis(
                config.cleanup_interval_ms,
            ))),
            prefix: config.prefix,
        })
    }
}

fn open_tier<V: CacheValue>(tier_config: &TierConfig) -> Result<Arc<dyn Tier<V>>, CacheError> {
    let name = tier_config.name();
    let surface: Arc<dyn KeyValueSurface> = match tier_config {
        TierConfig::Session { quota_bytes } => Arc::new(SessionSurface::with_quota(*quota_bytes)),
        TierConfig::File { path, quota_bytes } => {
            FileSurface::open_shared(path.clone(), *quota_bytes).map_err(|source| CacheError::TierOpen {
                tier: name.to_string(),
                source,
            })?
        }
    };
    Ok(Arc::new(PersistentTier::<V, dyn KeyValueSurface>::new(name, surface)))
}

impl<V: CacheValue> CacheManager<V> {
    /// Create a manager from configuration with the system clock.
    ///
    /// # Errors
    ///
    /// See [`CacheManagerBuilder::build`].
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        CacheManagerBuilder::new(config).build()
    }

    #[must_use]
    pub fn builder(config: CacheConfig) -> CacheManagerBuilder<V> {
        CacheManagerBuilder::new(config)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Persistent tier names in probe order.
    #[must_use]
    pub fn tier_names(&self) -> Vec<&str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Namespaces with a configured policy, sorted.
    #[must_use]
    pub fn configured_namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.namespaces.names().collect();
        names.sort_unstable();
        names
    }

    /// Put `entry` into the memory tier, evicting at most one key.
    pub(super) fn insert_memory(
        &self,
        key: &str,
        entry: crate::entry::CacheEntry<V>,
        namespace: Option<&str>,
    ) {
        let policy = self.namespaces.resolve(namespace);
        let scope = namespace
            .filter(|_| self.namespaces.has_own_capacity(namespace))
            .map(|name| Scope { name, capacity: policy.max_memory_entries });

        if let Some(victim) = self.memory.insert(key, entry, scope) {
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
            crate::metrics::record_eviction(if scope.is_some() { "namespace_capacity" } else { "capacity" });
            tracing::debug!(victim = %victim, inserted = %key, "Evicted from memory tier");
        }
        crate::metrics::set_memory_entries(self.memory.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::NamespaceOverride;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_manager_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CacheManager>();
        assert_send_sync::<CacheManager<String>>();
    }

    #[test]
    fn test_default_config_builds_session_tier() {
        let cache: CacheManager = CacheManager::new(CacheConfig::default()).unwrap();
        assert!(cache.is_enabled());
        assert_eq!(cache.prefix(), "cache_");
        assert_eq!(cache.tier_names(), vec!["session"]);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = CacheConfig { max_memory_entries: 0, ..Default::default() };
        let result: Result<CacheManager, _> = CacheManager::new(config);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_file_tier_open_failure() {
        let dir = tempdir().unwrap();
        // A directory where the file should be cannot be read as a file.
        let path = dir.path().join("taken");
        std::fs::create_dir(&path).unwrap();

        let config = CacheConfig {
            persistent_tiers: vec![TierConfig::File { path, quota_bytes: None }],
            ..Default::default()
        };
        let result: Result<CacheManager, _> = CacheManager::new(config);
        match result {
            Err(CacheError::TierOpen { tier, .. }) => assert_eq!(tier, "local"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected TierOpen"),
        }
    }

    #[test]
    fn test_disabled_manager_opens_no_tiers() {
        let config = CacheConfig { enabled: false, ..Default::default() };
        let cache: CacheManager = CacheManager::new(config).unwrap();
        assert!(cache.tier_names().is_empty());
    }

    #[test]
    fn test_builder_appends_shared_surface() {
        let shared = Arc::new(SessionSurface::new());
        let cache: CacheManager = CacheManager::builder(CacheConfig::memory_only())
            .clock(Arc::new(ManualClock::new(0)))
            .surface("shared", shared.clone())
            .build()
            .unwrap();

        cache.set("k", json!(1), None, None);
        assert_eq!(cache.tier_names(), vec!["shared"]);
        assert!(shared.get_item("cache_k").unwrap().is_some());
    }

    #[test]
    fn test_configured_namespaces_sorted() {
        let config = CacheConfig::memory_only()
            .with_namespace("users", NamespaceOverride::default())
            .with_namespace("roles", NamespaceOverride::default());
        let cache: CacheManager = CacheManager::new(config).unwrap();
        assert_eq!(cache.configured_namespaces(), vec!["roles", "users"]);
    }
}

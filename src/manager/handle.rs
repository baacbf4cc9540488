//! A manager view bound to one namespace.

use std::future::Future;
use std::time::Duration;

use super::types::WriteReport;
use super::{CacheManager, CacheValue};

/// Cache operations scoped to a single namespace.
///
/// ```rust
/// # use tiered_cache::{CacheConfig, CacheManager};
/// # use serde_json::json;
/// let cache: CacheManager = CacheManager::new(CacheConfig::memory_only().with_rbac_namespaces()).unwrap();
/// let roles = cache.namespace("roles");
///
/// roles.set("admin", json!({"perms": ["*"]}), None);
/// assert!(roles.has("admin"));
/// assert_eq!(roles.keys(), vec!["cache_roles_admin"]);
///
/// roles.clear();
/// assert!(!roles.has("admin"));
/// ```
pub struct NamespaceCache<'a, V: CacheValue> {
    manager: &'a CacheManager<V>,
    namespace: String,
}

impl<'a, V: CacheValue> NamespaceCache<'a, V> {
    pub(super) fn new(manager: &'a CacheManager<V>, namespace: &str) -> Self {
        Self {
            manager,
            namespace: namespace.to_string(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.namespace
    }

    fn ns(&self) -> Option<&str> {
        Some(&self.namespace)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.manager.get(key, self.ns())
    }

    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) -> WriteReport {
        self.manager.set(key, value, ttl, self.ns())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.manager.delete(key, self.ns())
    }

    pub fn has(&self, key: &str) -> bool {
        self.manager.has(key, self.ns())
    }

    pub fn delete_by_pattern(&self, pattern: &str) -> usize {
        self.manager.delete_by_pattern(pattern, self.ns())
    }

    /// Remove every key of this namespace.
    pub fn clear(&self) -> usize {
        self.manager.delete_by_pattern("*", self.ns())
    }

    /// Composed keys of this namespace across all tiers.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.manager.keys_by_namespace(self.ns())
    }

    /// See [`CacheManager::get_or_fetch`].
    ///
    /// # Errors
    ///
    /// Whatever `fetch` returns.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, ttl: Option<Duration>, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.manager.get_or_fetch(key, self.ns(), ttl, fetch).await
    }
}

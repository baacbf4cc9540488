//! Cache operations.
//!
//! Every operation composes the caller's key with the global prefix and
//! namespace, takes the operation lock and runs to completion. None of them
//! return errors: tier failures degrade to a miss or a no-op and are logged
//! and counted.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::handle::NamespaceCache;
use super::types::{CacheStats, WriteReport};
use super::{CacheManager, CacheValue};
use crate::entry::CacheEntry;
use crate::key::{compose_key, namespace_prefix, KeyPattern};
use crate::storage::{Lookup, Tier};

fn duration_ms(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

impl<V: CacheValue> CacheManager<V> {
    // ═══════════════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════════════

    /// Look up `key` in `namespace`.
    ///
    /// Checks the memory tier, then each persistent tier in order. A
    /// persistent hit is promoted into memory with its original expiry.
    /// Expired entries found on the way are deleted.
    #[tracing::instrument(skip(self), fields(tier))]
    pub fn get(&self, key: &str, namespace: Option<&str>) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let _timer = crate::time_operation!("all", "get");
        let full_key = compose_key(&self.prefix, namespace, key);
        let _op = self.op_lock.lock();
        self.lookup_locked(&full_key, namespace).map(CacheEntry::into_value)
    }

    /// Whether a fresh value exists for `key` (counts as a lookup).
    #[tracing::instrument(skip(self))]
    pub fn has(&self, key: &str, namespace: Option<&str>) -> bool {
        if !self.enabled {
            return false;
        }
        let full_key = compose_key(&self.prefix, namespace, key);
        let _op = self.op_lock.lock();
        self.lookup_locked(&full_key, namespace).is_some()
    }

    fn lookup_locked(&self, full_key: &str, namespace: Option<&str>) -> Option<CacheEntry<V>> {
        let now = self.clock.now_ms();

        match self.memory.lookup(full_key, now) {
            Lookup::Hit(entry) => {
                tracing::Span::current().record("tier", "memory");
                crate::metrics::record_operation("memory", "get", "hit");
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry);
            }
            Lookup::Expired => {
                debug!(key = %full_key, "Expired in memory tier");
                crate::metrics::record_operation("memory", "get", "expired");
                crate::metrics::set_memory_entries(self.memory.len());
            }
            Lookup::Miss => crate::metrics::record_operation("memory", "get", "miss"),
        }

        for tier in &self.tiers {
            let name = tier.name();
            match tier.get(full_key) {
                Ok(Some(entry)) if !entry.is_expired(now) => {
                    self.insert_memory(full_key, entry.clone(), namespace);
                    tracing::Span::current().record("tier", name);
                    debug!(key = %full_key, tier = %name, "Persistent hit, promoted to memory");
                    crate::metrics::record_operation(name, "get", "hit");
                    crate::metrics::record_promotion(name);
                    self.counters.hits.fetch_add(1, Ordering::Relaxed);
                    self.counters.promotions.fetch_add(1, Ordering::Relaxed);
                    return Some(entry);
                }
                Ok(Some(_)) => {
                    crate::metrics::record_operation(name, "get", "expired");
                    if let Err(e) = tier.delete(full_key) {
                        warn!(key = %full_key, tier = %name, error = %e, "Failed to delete expired entry");
                        crate::metrics::record_error(name, "delete", e.kind());
                    }
                }
                Ok(None) => crate::metrics::record_operation(name, "get", "miss"),
                Err(e) => {
                    warn!(key = %full_key, tier = %name, error = %e, "Tier lookup failed, treating as miss");
                    crate::metrics::record_error(name, "get", e.kind());
                }
            }
        }

        crate::metrics::record_operation("all", "get", "miss");
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Read-through: return the cached value, or run `fetch`, cache its
    /// result and return it.
    ///
    /// A fetch error is handed back unchanged and nothing is cached. The
    /// operation lock is not held while `fetch` runs.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use tiered_cache::{CacheConfig, CacheManager};
    /// # use serde_json::{json, Value};
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let cache: CacheManager = CacheManager::new(CacheConfig::memory_only()).unwrap();
    /// let roles = cache
    ///     .get_or_fetch("all", Some("roles"), None, || async {
    ///         Ok::<_, std::io::Error>(json!(["admin", "viewer"]))
    ///     })
    ///     .await
    ///     .unwrap();
    /// assert_eq!(cache.get("all", Some("roles")), Some(roles));
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Whatever `fetch` returns.
    pub async fn get_or_fetch<F, Fut, E>(
        &self,
        key: &str,
        namespace: Option<&str>,
        ttl: Option<Duration>,
        fetch: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key, namespace) {
            return Ok(value);
        }

        let value = fetch().await?;
        self.set(key, value.clone(), ttl, namespace);
        Ok(value)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Writes
    // ═══════════════════════════════════════════════════════════════════════════

    /// Store `value` under `key` in `namespace`.
    ///
    /// The entry expires `ttl` from now (namespace default when `None`). It
    /// always goes to the memory tier, evicting at most one key, and is
    /// mirrored to every persistent tier unless the namespace is memory-only.
    #[tracing::instrument(skip(self, value))]
    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>, namespace: Option<&str>) -> WriteReport {
        if !self.enabled {
            return WriteReport::default();
        }
        let _timer = crate::time_operation!("all", "set");
        let full_key = compose_key(&self.prefix, namespace, key);
        let policy = self.namespaces.resolve(namespace);
        let ttl_ms = ttl.map_or(policy.default_ttl_ms, duration_ms);

        let _op = self.op_lock.lock();
        let entry = CacheEntry::new(value, self.clock.now_ms(), ttl_ms);

        let mut report = WriteReport { cached: true, ..Default::default() };
        if policy.enable_persistent_tiers {
            for tier in &self.tiers {
                if self.write_through(tier, &full_key, &entry) {
                    report.persisted.push(tier.name().to_string());
                } else {
                    report.failed.push(tier.name().to_string());
                }
            }
        }
        self.insert_memory(&full_key, entry, namespace);
        crate::metrics::record_operation("memory", "set", "success");

        report
    }

    /// Write to one persistent tier; on failure sweep it once and retry.
    fn write_through(&self, tier: &Arc<dyn Tier<V>>, full_key: &str, entry: &CacheEntry<V>) -> bool {
        let name = tier.name();
        let first = match tier.set(full_key, entry) {
            Ok(()) => {
                crate::metrics::record_operation(name, "set", "success");
                return true;
            }
            Err(e) => e,
        };

        warn!(key = %full_key, tier = %name, error = %first, "Tier write failed, sweeping and retrying");
        crate::metrics::record_error(name, "set", first.kind());
        match tier.cleanup_expired(&self.prefix, self.clock.now_ms()) {
            Ok(removed) => {
                debug!(tier = %name, removed, "Swept tier before retry");
                crate::metrics::record_expired_removed(name, removed);
            }
            Err(e) => warn!(tier = %name, error = %e, "Sweep before retry failed"),
        }

        match tier.set(full_key, entry) {
            Ok(()) => {
                crate::metrics::record_operation(name, "set", "retried");
                true
            }
            Err(second) => {
                error!(key = %full_key, tier = %name, error = %second, "Tier write dropped after retry");
                crate::metrics::record_error(name, "set", second.kind());
                crate::metrics::record_dropped_write(name);
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Remove `key` from every tier. Returns whether any tier held it.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, key: &str, namespace: Option<&str>) -> bool {
        if !self.enabled {
            return false;
        }
        let _timer = crate::time_operation!("all", "delete");
        let full_key = compose_key(&self.prefix, namespace, key);
        let _op = self.op_lock.lock();

        let mut removed = self.memory.remove(&full_key);
        for tier in &self.tiers {
            match tier.delete(&full_key) {
                Ok(hit) => removed |= hit,
                Err(e) => {
                    warn!(key = %full_key, tier = %tier.name(), error = %e, "Tier delete failed");
                    crate::metrics::record_error(tier.name(), "delete", e.kind());
                }
            }
        }
        crate::metrics::set_memory_entries(self.memory.len());
        removed
    }

    /// Remove every key of `namespace` matching `pattern` from every tier.
    ///
    /// `*` matches any run of characters; everything else is literal. The
    /// pattern is anchored to the whole raw key. Returns the number of
    /// distinct keys removed.
    #[tracing::instrument(skip(self))]
    pub fn delete_by_pattern(&self, pattern: &str, namespace: Option<&str>) -> usize {
        if !self.enabled {
            return 0;
        }
        let _timer = crate::time_operation!("all", "delete_pattern");
        let pattern = KeyPattern::scoped(&self.prefix, namespace, pattern);
        let _op = self.op_lock.lock();

        let mut doomed = BTreeSet::new();
        let literal = pattern.literal_prefix();
        for tier in self.all_tiers() {
            match tier.list_keys_by_prefix(literal) {
                Ok(keys) => doomed.extend(keys.into_iter().filter(|key| pattern.matches(key))),
                Err(e) => warn!(tier = %tier.name(), error = %e, "Listing keys failed"),
            }
            match tier.delete_by_pattern(&pattern) {
                Ok(removed) => crate::metrics::record_pattern_removed(tier.name(), removed),
                Err(e) => {
                    warn!(tier = %tier.name(), pattern = %pattern, error = %e, "Pattern delete failed");
                    crate::metrics::record_error(tier.name(), "delete_pattern", e.kind());
                }
            }
        }
        crate::metrics::set_memory_entries(self.memory.len());

        debug!(pattern = %pattern, removed = doomed.len(), "Pattern invalidation");
        doomed.len()
    }

    /// Empty the memory tier and purge every persisted key under the global
    /// prefix. Counters start over.
    #[tracing::instrument(skip(self))]
    pub fn clear(&self) {
        if !self.enabled {
            return;
        }
        let _op = self.op_lock.lock();

        self.memory.reset();
        for tier in &self.tiers {
            match tier.clear(&self.prefix) {
                Ok(removed) => debug!(tier = %tier.name(), removed, "Cleared tier"),
                Err(e) => {
                    warn!(tier = %tier.name(), error = %e, "Tier clear failed");
                    crate::metrics::record_error(tier.name(), "clear", e.kind());
                }
            }
        }
        self.counters.reset();
        crate::metrics::set_memory_entries(0);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Maintenance & introspection
    // ═══════════════════════════════════════════════════════════════════════════

    /// Remove expired entries under the global prefix from every tier.
    ///
    /// Persistent tiers also drop entries that no longer parse. Returns the
    /// number of entries removed across all tiers.
    #[tracing::instrument(skip(self))]
    pub fn cleanup_expired(&self) -> usize {
        if !self.enabled {
            return 0;
        }
        let started = Instant::now();
        let _op = self.op_lock.lock();
        let now = self.clock.now_ms();

        let mut total = 0;
        for tier in self.all_tiers() {
            match tier.cleanup_expired(&self.prefix, now) {
                Ok(removed) => {
                    crate::metrics::record_expired_removed(tier.name(), removed);
                    total += removed;
                }
                Err(e) => {
                    warn!(tier = %tier.name(), error = %e, "Expired-entry sweep failed");
                    crate::metrics::record_error(tier.name(), "cleanup", e.kind());
                }
            }
        }
        crate::metrics::set_memory_entries(self.memory.len());
        crate::metrics::record_latency("all", "cleanup", started.elapsed());

        if total > 0 {
            debug!(removed = total, "Removed expired entries");
        }
        total
    }

    /// Entry counts per tier plus lookup counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let _op = self.op_lock.lock();

        let mut tiers = std::collections::BTreeMap::new();
        if self.enabled {
            for tier in self.all_tiers() {
                let count = tier.count_by_prefix(&self.prefix).unwrap_or_else(|e| {
                    warn!(tier = %tier.name(), error = %e, "Counting entries failed");
                    0
                });
                if tier.name() != "memory" {
                    crate::metrics::set_tier_entries(tier.name(), count);
                }
                tiers.insert(tier.name().to_string(), count);
            }
        }

        CacheStats {
            enabled: self.enabled,
            prefix: self.prefix.clone(),
            tiers,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            promotions: self.counters.promotions.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
            scheduler: self.scheduler.lock().state(),
        }
    }

    /// Composed keys held for `namespace` by any tier, sorted and de-duplicated.
    ///
    /// `None` lists every key under the global prefix.
    #[must_use]
    pub fn keys_by_namespace(&self, namespace: Option<&str>) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let prefix = namespace_prefix(&self.prefix, namespace);
        let _op = self.op_lock.lock();

        let mut keys = BTreeSet::new();
        for tier in self.all_tiers() {
            match tier.list_keys_by_prefix(&prefix) {
                Ok(found) => keys.extend(found),
                Err(e) => warn!(tier = %tier.name(), error = %e, "Listing keys failed"),
            }
        }
        keys.into_iter().collect()
    }

    /// A view of this manager bound to one namespace.
    #[must_use]
    pub fn namespace(&self, name: &str) -> NamespaceCache<'_, V> {
        NamespaceCache::new(self, name)
    }

    /// Memory tier first, then persistent tiers in probe order.
    fn all_tiers(&self) -> impl Iterator<Item = &dyn Tier<V>> + '_ {
        let memory: &dyn Tier<V> = &self.memory;
        std::iter::once(memory).chain(self.tiers.iter().map(|tier| &**tier))
    }
}

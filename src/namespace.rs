//! Resolved per-namespace policy.
//!
//! Built once from [`CacheConfig`]: every override is merged with the
//! manager-level defaults up front, so lookups are a single exact-match map
//! probe. Unknown namespaces resolve to the defaults without complaint.

use std::collections::HashMap;

use tracing::debug;

use crate::config::CacheConfig;

/// Effective policy for one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceConfig {
    pub default_ttl_ms: u64,
    pub max_memory_entries: usize,
    pub enable_persistent_tiers: bool,
}

/// Exact-match namespace → policy table with a manager-level fallback.
#[derive(Debug, Clone)]
pub struct NamespaceTable {
    fallback: NamespaceConfig,
    entries: HashMap<String, NamespaceConfig>,
}

impl NamespaceTable {
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        let fallback = NamespaceConfig {
            default_ttl_ms: config.default_ttl_ms,
            max_memory_entries: config.max_memory_entries,
            enable_persistent_tiers: config.enable_persistent_tiers,
        };

        let entries = config
            .namespaces
            .iter()
            .map(|(name, policy)| {
                let resolved = NamespaceConfig {
                    default_ttl_ms: policy.default_ttl_ms.unwrap_or(fallback.default_ttl_ms),
                    max_memory_entries: policy
                        .max_memory_entries
                        .unwrap_or(fallback.max_memory_entries)
                        .min(fallback.max_memory_entries),
                    enable_persistent_tiers: policy
                        .enable_persistent_tiers
                        .unwrap_or(fallback.enable_persistent_tiers),
                };
                (name.clone(), resolved)
            })
            .collect();

        Self { fallback, entries }
    }

    /// Policy for `namespace`; `None`, empty and unknown names get the fallback.
    #[must_use]
    pub fn resolve(&self, namespace: Option<&str>) -> NamespaceConfig {
        let Some(name) = namespace.filter(|ns| !ns.is_empty()) else {
            return self.fallback;
        };
        match self.entries.get(name) {
            Some(policy) => *policy,
            None => {
                debug!(namespace = %name, "No policy for namespace, using defaults");
                self.fallback
            }
        }
    }

    /// Whether `namespace` carries its own capacity bound below the global one.
    #[must_use]
    pub fn has_own_capacity(&self, namespace: Option<&str>) -> bool {
        self.resolve(namespace).max_memory_entries < self.fallback.max_memory_entries
    }

    /// Configured namespace names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

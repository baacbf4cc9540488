//! Configuration for the cache manager.
//!
//! # Example
//!
//! ```
//! use tiered_cache::CacheConfig;
//!
//! // Minimal config (uses defaults)
//! let config = CacheConfig::default();
//! assert_eq!(config.default_ttl_ms, 10 * 60 * 1000); // 10 minutes
//! assert_eq!(config.max_memory_entries, 100);
//!
//! // Loaded from JSON, with a per-namespace override
//! let config: CacheConfig = serde_json::from_str(r#"{
//!     "prefix": "console_",
//!     "max_memory_entries": 500,
//!     "namespaces": { "tenants": { "default_ttl_ms": 1800000, "max_memory_entries": 50 } },
//!     "persistent_tiers": [ { "kind": "session" } ]
//! }"#).unwrap();
//! assert_eq!(config.namespaces["tenants"].max_memory_entries, Some(50));
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::CacheError;
use crate::eviction::EvictionPolicy;

/// Configuration for the cache manager.
///
/// All fields have defaults. Namespace overrides are merged once, when the
/// manager is built; there is no runtime reconfiguration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// When false the manager never stores anything and every read misses
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Global key prefix shared by every namespace
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// TTL used when neither the caller nor the namespace gives one (default: 10 min)
    #[serde(default = "default_ttl_ms")]
    pub default_ttl_ms: u64,

    /// Memory tier capacity in entries (default: 100)
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,

    /// Mirror writes to persistent tiers unless a namespace says otherwise
    #[serde(default = "default_enable_persistent_tiers")]
    pub enable_persistent_tiers: bool,

    /// Victim selection for the memory tier
    #[serde(default)]
    pub eviction_policy: EvictionPolicy,

    /// Expired-entry sweep interval (default: 60 s)
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,

    /// Per-namespace overrides, exact-match lookup
    #[serde(default)]
    pub namespaces: HashMap<String, NamespaceOverride>,

    /// Persistent tiers in probe order
    #[serde(default = "default_persistent_tiers")]
    pub persistent_tiers: Vec<TierConfig>,
}

/// Optional per-namespace policy. Unset fields inherit the manager defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NamespaceOverride {
    #[serde(default)]
    pub default_ttl_ms: Option<u64>,
    #[serde(default)]
    pub max_memory_entries: Option<usize>,
    #[serde(default)]
    pub enable_persistent_tiers: Option<bool>,
}

impl NamespaceOverride {
    #[must_use]
    pub fn new(default_ttl_ms: u64, max_memory_entries: usize) -> Self {
        Self {
            default_ttl_ms: Some(default_ttl_ms),
            max_memory_entries: Some(max_memory_entries),
            enable_persistent_tiers: None,
        }
    }

    /// Keep this namespace in memory only.
    #[must_use]
    pub fn memory_only(mut self) -> Self {
        self.enable_persistent_tiers = Some(false);
        self
    }
}

/// A persistent tier to build from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TierConfig {
    /// Process-lifetime storage (lost on restart)
    Session {
        #[serde(default = "default_quota_bytes")]
        quota_bytes: Option<usize>,
    },
    /// Durable storage in a JSON file
    File {
        path: PathBuf,
        #[serde(default = "default_quota_bytes")]
        quota_bytes: Option<usize>,
    },
}

impl TierConfig {
    /// Tier name used in stats, logs and metrics labels.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Session { .. } => "session",
            Self::File { .. } => "local",
        }
    }
}

const MINUTE_MS: u64 = 60 * 1000;

fn default_enabled() -> bool { true }
fn default_prefix() -> String { "cache_".to_string() }
fn default_ttl_ms() -> u64 { 10 * MINUTE_MS }
fn default_max_memory_entries() -> usize { 100 }
fn default_enable_persistent_tiers() -> bool { true }
fn default_cleanup_interval_ms() -> u64 { 60_000 }
fn default_quota_bytes() -> Option<usize> { Some(5 * 1024 * 1024) } // 5 MB
fn default_persistent_tiers() -> Vec<TierConfig> {
    vec![TierConfig::Session { quota_bytes: default_quota_bytes() }]
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            prefix: default_prefix(),
            default_ttl_ms: default_ttl_ms(),
            max_memory_entries: default_max_memory_entries(),
            enable_persistent_tiers: default_enable_persistent_tiers(),
            eviction_policy: EvictionPolicy::default(),
            cleanup_interval_ms: default_cleanup_interval_ms(),
            namespaces: HashMap::new(),
            persistent_tiers: default_persistent_tiers(),
        }
    }
}

impl CacheConfig {
    /// Memory-only configuration (no persistent tiers).
    #[must_use]
    pub fn memory_only() -> Self {
        Self {
            persistent_tiers: Vec::new(),
            ..Default::default()
        }
    }

    /// Add or replace a namespace override.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>, policy: NamespaceOverride) -> Self {
        self.namespaces.insert(namespace.into(), policy);
        self
    }

    /// Add the RBAC lookup namespaces with their usual TTLs and capacities.
    #[must_use]
    pub fn with_rbac_namespaces(mut self) -> Self {
        for (namespace, policy) in rbac_namespaces() {
            self.namespaces.entry(namespace.to_string()).or_insert(policy);
        }
        self
    }

    /// Reject settings the engine cannot honour.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_memory_entries == 0 {
            return Err(CacheError::InvalidConfig(
                "max_memory_entries must be greater than 0".into(),
            ));
        }
        if self.default_ttl_ms == 0 {
            return Err(CacheError::InvalidConfig("default_ttl_ms must be greater than 0".into()));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(CacheError::InvalidConfig(
                "cleanup_interval_ms must be greater than 0".into(),
            ));
        }
        for (namespace, policy) in &self.namespaces {
            if namespace.is_empty() {
                return Err(CacheError::InvalidConfig("namespace names must not be empty".into()));
            }
            if policy.max_memory_entries == Some(0) {
                return Err(CacheError::InvalidConfig(format!(
                    "namespace '{namespace}': max_memory_entries must be greater than 0"
                )));
            }
            if policy.default_ttl_ms == Some(0) {
                return Err(CacheError::InvalidConfig(format!(
                    "namespace '{namespace}': default_ttl_ms must be greater than 0"
                )));
            }
        }
        Ok(())
    }
}

/// Preset policies for the RBAC lookup namespaces.
#[must_use]
pub fn rbac_namespaces() -> [(&'static str, NamespaceOverride); 5] {
    [
        ("tenants", NamespaceOverride::new(30 * MINUTE_MS, 50)),
        ("roles", NamespaceOverride::new(15 * MINUTE_MS, 100)),
        ("users", NamespaceOverride::new(10 * MINUTE_MS, 200)),
        ("permissions", NamespaceOverride::new(20 * MINUTE_MS, 100)),
        ("departments", NamespaceOverride::new(15 * MINUTE_MS, 100)),
    ]
}

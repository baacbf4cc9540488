//! Cache key composition, wildcard patterns and request fingerprints.
//!
//! Every tier stores entries under the fully composed key:
//!
//! ```text
//! <global prefix><namespace>_<raw key>     e.g. "cache_rbac_user_1"
//! <global prefix><raw key>                 (no namespace)
//! ```
//!
//! Patterns are matched against that composed form. The prefix and namespace
//! of a scoped pattern are literal text; only the caller's part may hold `*`.
//! Scoping is by key prefix, so a namespace that is itself a prefix of
//! another plus `_` overlaps it: `*` under `rbac` also matches keys written
//! under `rbac_user`. Keep namespace names from prefixing one another.
//!
//! # Example
//!
//! ```
//! use tiered_cache::key::{compose_key, KeyPattern};
//!
//! let key = compose_key("cache_", Some("rbac"), "user_1");
//! assert_eq!(key, "cache_rbac_user_1");
//!
//! let pattern = KeyPattern::scoped("cache_", Some("rbac"), "user_*");
//! assert!(pattern.matches(&key));
//! assert!(!pattern.matches("cache_rbac_role_1"));
//! ```

use serde::Serialize;
use sha2::{Digest, Sha256};

/// The only wildcard: matches any (possibly empty) run of characters.
pub const WILDCARD: char = '*';

/// Hex characters of the params digest kept in a fingerprint.
const FINGERPRINT_DIGEST_LEN: usize = 16;

/// Key prefix shared by everything in `namespace` (or the bare global prefix).
#[must_use]
pub fn namespace_prefix(global_prefix: &str, namespace: Option<&str>) -> String {
    match namespace.filter(|ns| !ns.is_empty()) {
        Some(ns) => format!("{global_prefix}{ns}_"),
        None => global_prefix.to_string(),
    }
}

/// Compose the storage key for `raw_key`. An empty namespace is the same as none.
#[must_use]
pub fn compose_key(global_prefix: &str, namespace: Option<&str>, raw_key: &str) -> String {
    let mut key = namespace_prefix(global_prefix, namespace);
    key.push_str(raw_key);
    key
}

/// A compiled key pattern, anchored at both ends.
///
/// Characters other than `*` are literal; there is no escaping and no other
/// metacharacter, so raw keys containing `.`, `?`, `(` and friends match
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPattern {
    /// No wildcard: the key must equal this string.
    Exact(String),
    /// Literal segments between wildcards. `a*b*c` → `["a", "b", "c"]`;
    /// always at least two segments.
    Wildcard(Vec<String>),
}

impl KeyPattern {
    /// Compile a pattern that is already in composed-key form.
    #[must_use]
    pub fn compile(pattern: &str) -> Self {
        if pattern.contains(WILDCARD) {
            Self::Wildcard(pattern.split(WILDCARD).map(str::to_string).collect())
        } else {
            Self::Exact(pattern.to_string())
        }
    }

    /// Compile a caller pattern scoped to `namespace` under `global_prefix`.
    ///
    /// A `*` inside the prefix or namespace is matched literally.
    #[must_use]
    pub fn scoped(global_prefix: &str, namespace: Option<&str>, pattern: &str) -> Self {
        let scope = namespace_prefix(global_prefix, namespace);
        match Self::compile(pattern) {
            Self::Exact(key) => Self::Exact(scope + &key),
            Self::Wildcard(mut segments) => {
                if let Some(first) = segments.first_mut() {
                    first.insert_str(0, &scope);
                }
                Self::Wildcard(segments)
            }
        }
    }

    /// Leading literal text every matching key starts with.
    #[must_use]
    pub fn literal_prefix(&self) -> &str {
        match self {
            Self::Exact(key) => key,
            Self::Wildcard(segments) => segments.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Anchored match against a composed key.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(expected) => key == expected,
            Self::Wildcard(segments) => match_segments(segments, key),
        }
    }
}

impl std::fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(key) => write!(f, "{key}"),
            Self::Wildcard(segments) => write!(f, "{}", segments.join("*")),
        }
    }
}

/// First segment anchors the start, last anchors the end, middle segments
/// are taken leftmost-first. Leftmost is optimal when `*` is the only
/// metacharacter.
fn match_segments(segments: &[String], key: &str) -> bool {
    let (first, rest) = match segments.split_first() {
        Some(split) => split,
        None => return key.is_empty(),
    };
    let Some(mut remaining) = key.strip_prefix(first.as_str()) else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return remaining.is_empty();
    };

    for segment in middle {
        match remaining.find(segment.as_str()) {
            Some(at) => remaining = &remaining[at + segment.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last.as_str())
}

/// Fingerprint a request: `resource` kept verbatim as a prefix, followed by a
/// short digest of the JSON-serialized parameters.
///
/// Equal parameters always give equal fingerprints. Invalidate every cached
/// query of a resource with `delete_by_pattern(&format!("{resource}_*"), ..)`.
///
/// ```
/// use serde_json::json;
/// use tiered_cache::key::fingerprint;
///
/// let a = fingerprint("tenants", &json!({"page": 1, "size": 10}));
/// let b = fingerprint("tenants", &json!({"page": 1, "size": 10}));
/// assert_eq!(a, b);
/// assert!(a.starts_with("tenants_"));
/// ```
#[must_use]
pub fn fingerprint<P: Serialize + ?Sized>(resource: &str, params: &P) -> String {
    // Serializing plain data to a Vec cannot fail; a broken Serialize impl
    // degrades to hashing nothing.
    let encoded = serde_json::to_vec(params).unwrap_or_default();
    let digest = hex::encode(Sha256::digest(&encoded));
    format!("{resource}_{}", &digest[..FINGERPRINT_DIGEST_LEN])
}

//! Raw string key-value surfaces that persistent tiers sit on.
//!
//! A surface knows nothing about entries or expiry. It stores opaque strings
//! and may refuse a write (quota, I/O). Listing is a full scan; there is no
//! prefix index.

use super::traits::StorageError;

/// Bytes an item is charged against a quota: key plus value.
#[inline]
#[must_use]
pub fn item_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

pub trait KeyValueSurface: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: String) -> Result<(), StorageError>;

    /// Returns whether the key was present.
    fn remove_item(&self, key: &str) -> Result<bool, StorageError>;

    /// Remove several keys. Returns how many were present.
    fn remove_items(&self, keys: &[String]) -> Result<usize, StorageError> {
        let mut removed = 0;
        for key in keys {
            if self.remove_item(key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Every stored key, in no particular order.
    fn keys(&self) -> Result<Vec<String>, StorageError>;

    /// Bytes currently charged against the quota.
    fn used_bytes(&self) -> usize;

    /// Byte quota, if any.
    fn quota_bytes(&self) -> Option<usize>;
}

/// Check that replacing an item of `old_size` bytes with one of `new_size`
/// bytes keeps `used` within `quota`.
pub(crate) fn check_quota(
    used: usize,
    old_size: usize,
    new_size: usize,
    quota: Option<usize>,
) -> Result<(), StorageError> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let needed = used.saturating_sub(old_size).saturating_add(new_size);
    if needed > quota {
        return Err(StorageError::QuotaExceeded { needed, quota });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_size_counts_key_and_value() {
        assert_eq!(item_size("ab", "cde"), 5);
    }

    #[test]
    fn test_check_quota() {
        assert!(check_quota(100, 0, 1_000, None).is_ok());
        assert!(check_quota(90, 0, 10, Some(100)).is_ok());
        assert!(matches!(
            check_quota(90, 0, 11, Some(100)),
            Err(StorageError::QuotaExceeded { needed: 101, quota: 100 })
        ));
        // Replacing a larger item frees room.
        assert!(check_quota(100, 50, 40, Some(100)).is_ok());
    }
}

//! Errors raised while building or driving a cache manager.
//!
//! Cache operations themselves never fail; see [`crate::StorageError`] for
//! the tier-level errors they absorb.

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
    #[error("Cleanup scheduler needs a running tokio runtime")]
    NoRuntime,
    #[error("Failed to open persistent tier '{tier}': {source}")]
    TierOpen {
        tier: String,
        #[source]
        source: StorageError,
    },
}

//! Storage tiers.
//!
//! ```text
//! ┌───────────────────────────────┐
//! │  BoundedMemoryTier            │  volatile, capacity-bounded, co-indexed
//! │  (memory.rs)                  │  with the eviction tracker
//! └───────────────────────────────┘
//!                │ miss
//!                ▼
//! ┌───────────────────────────────┐
//! │  PersistentTier  (0..n)       │  JSON entries over a KeyValueSurface:
//! │  (persistent.rs)              │  ├─ SessionSurface (session.rs)
//! │                               │  └─ FileSurface    (file.rs)
//! └───────────────────────────────┘
//! ```

pub mod traits;
pub mod memory;
pub mod surface;
pub mod session;
pub mod file;
pub mod persistent;

pub use traits::{StorageError, Tier};
pub use memory::{BoundedMemoryTier, Lookup, Scope};
pub use surface::KeyValueSurface;
pub use session::SessionSurface;
pub use file::FileSurface;
pub use persistent::PersistentTier;

//! Advanced cache for GET responses
//!
//! Responses are stored on disk as raw JSON bodies keyed by a digest of the
//! request. A single server-issued version token governs the whole cache:
//! when it changes, every entry is dropped.

mod coordinator;
mod key;
mod store;
mod version;

pub use coordinator::{CacheCoordinator, CacheState, ResponseBody};
pub use key::CacheKey;
pub use store::{CacheConfig, CacheStore, StorageError, CACHE_DIR_ENV};
pub use version::{VersionMetadata, VersionToken};

//! Version-driven cache lifecycle
//!
//! The coordinator runs the startup handshake against the server's version
//! metadata once, then wraps each GET with lookup and store. Storage failures
//! never reach the caller: they switch the coordinator to `Disabled` and the
//! request falls through to the network.

use serde::de::IgnoredAny;
use tracing::{debug, info, warn};

use super::key::CacheKey;
use super::store::{CacheStore, StorageError};
use super::version::VersionMetadata;
use crate::client::request::GetRequest;
use crate::error::ClientError;

/// Lifecycle of the cache for one client instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Version handshake not run yet
    Uninitialized,
    /// Never consulted for the rest of the instance's life
    Disabled,
    /// No local token existed; the cache starts cold
    Bootstrapped,
    /// Local token matches the server's (possibly after a clear)
    Active,
}

impl CacheState {
    /// Whether GETs read and write entries in this state
    pub fn is_enabled(&self) -> bool {
        matches!(self, CacheState::Active | CacheState::Bootstrapped)
    }
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CacheState::Uninitialized => "uninitialized",
            CacheState::Disabled => "disabled",
            CacheState::Bootstrapped => "bootstrapped",
            CacheState::Active => "active",
        })
    }
}

/// A response body and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBody {
    pub bytes: Vec<u8>,
    pub from_cache: bool,
}

impl ResponseBody {
    pub fn fetched(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            from_cache: false,
        }
    }
}

/// Decides when the cache is consulted and keeps it in step with the server
#[derive(Debug, Clone)]
pub struct CacheCoordinator {
    store: Option<CacheStore>,
    state: CacheState,
}

impl CacheCoordinator {
    pub fn new(store: CacheStore) -> Self {
        Self {
            store: Some(store),
            state: CacheState::Uninitialized,
        }
    }

    /// A coordinator with no cache directory at all
    pub fn without_store() -> Self {
        Self {
            store: None,
            state: CacheState::Disabled,
        }
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn cache_store(&self) -> Option<&CacheStore> {
        self.store.as_ref()
    }

    /// Turns caching off for the rest of this instance
    pub fn disable(&mut self, reason: &str) {
        if self.state != CacheState::Disabled {
            warn!(reason, "advanced cache disabled");
        }
        self.state = CacheState::Disabled;
    }

    /// Runs the version handshake against the server's metadata
    ///
    /// # Returns
    /// The resulting state. Anything that goes wrong yields `Disabled`.
    pub fn initialize_cache(&mut self, metadata: &VersionMetadata) -> CacheState {
        match self.try_initialize(metadata) {
            Ok(state) => {
                info!(state = %state, "advanced cache initialized");
                self.state = state;
            }
            Err(e) => self.disable(&e.to_string()),
        }
        self.state
    }

    fn try_initialize(&self, metadata: &VersionMetadata) -> Result<CacheState, StorageError> {
        let Some(store) = &self.store else {
            return Ok(CacheState::Disabled);
        };
        if !metadata.is_allowed() {
            debug!(allow = metadata.allow, "server does not allow caching");
            return Ok(CacheState::Disabled);
        }
        let Some(remote) = &metadata.last_modified else {
            warn!("version metadata has no last_modified token");
            return Ok(CacheState::Disabled);
        };

        store.initialize()?;

        match store.read_local_version()? {
            None => {
                store.write_local_version(remote)?;
                Ok(CacheState::Bootstrapped)
            }
            Some(local) if local.matches(remote) => Ok(CacheState::Active),
            Some(local) => {
                info!(local = %local, remote = %remote, "cache version changed, clearing entries");
                store.write_local_version(remote)?;
                if let Err(e) = store.clear_all_entries() {
                    warn!(error = %e, "stale cache entries left behind");
                }
                Ok(CacheState::Active)
            }
        }
    }

    /// Reads a stored body; misses and failures both return `None`
    pub fn lookup(&mut self, key: &CacheKey) -> Option<Vec<u8>> {
        if !self.state.is_enabled() {
            return None;
        }
        let store = self.store.as_ref()?;
        match store.read_entry(key) {
            Ok(hit) => hit,
            Err(e) => {
                self.disable(&e.to_string());
                None
            }
        }
    }

    /// Stores a body; a failure disables the cache
    pub fn store(&mut self, key: &CacheKey, bytes: &[u8]) {
        if !self.state.is_enabled() {
            return;
        }
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(e) = store.write_entry(key, bytes) {
            self.disable(&e.to_string());
        }
    }

    /// Deletes every stored entry regardless of state
    pub fn invalidate_all(&self) -> Result<usize, StorageError> {
        match &self.store {
            Some(store) => store.clear_all_entries(),
            None => Ok(0),
        }
    }

    /// Serves `request` from the cache, or runs `fetch` and stores its body
    ///
    /// `fetch` must only return `Ok` for bodies worth keeping.
    pub fn execute<F>(&mut self, request: &GetRequest, fetch: F) -> Result<ResponseBody, ClientError>
    where
        F: FnOnce() -> Result<Vec<u8>, ClientError>,
    {
        if !self.state.is_enabled() || request.is_preview() {
            return fetch().map(ResponseBody::fetched);
        }

        let key = CacheKey::derive(&request.signature());
        if let Some(bytes) = self.lookup(&key) {
            if serde_json::from_slice::<IgnoredAny>(&bytes).is_ok() {
                debug!(key = %key, "cache hit");
                return Ok(ResponseBody {
                    bytes,
                    from_cache: true,
                });
            }
            warn!(key = %key, "discarding unreadable cache entry");
        } else {
            debug!(key = %key, "cache miss");
        }

        let bytes = fetch()?;
        self.store(&key, &bytes);
        Ok(ResponseBody::fetched(bytes))
    }
}

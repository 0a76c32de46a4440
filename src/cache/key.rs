//! Cache key derivation
//!
//! A key is the hex MD5 digest of the canonical request signature. The
//! signature keeps params in caller order, so the same params supplied in a
//! different order map to a different key.

use std::fmt;

use crate::client::request::QuerySignature;

/// Fixed-width identifier of a cached response
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for a normalized request signature
    pub fn derive(signature: &QuerySignature<'_>) -> Self {
        Self::from_canonical(&signature.canonical())
    }

    /// Hashes an already-built canonical string
    pub fn from_canonical(canonical: &str) -> Self {
        Self(format!("{:x}", md5::compute(canonical.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

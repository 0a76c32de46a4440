//! Client configuration
//!
//! Settings are fixed when the client is built. `from_env` reads the same
//! variables the CLI accepts.

use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheConfig, CACHE_DIR_ENV};

/// Environment variable holding the API endpoint
pub const ENDPOINT_ENV: &str = "POSTEASE_ENDPOINT";

/// Environment variable holding the default API key
pub const API_KEY_ENV: &str = "POSTEASE_KEY";

/// Environment variable that turns the advanced cache off when set to a
/// non-empty value other than `0`
pub const NO_CACHE_ENV: &str = "POSTEASE_NO_CACHE";

/// Default transport timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for `PostEaseClient`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the API
    pub endpoint: Option<String>,
    /// Key sent with requests that do not carry their own
    pub api_key: Option<String>,
    /// Cache location; `None` turns the advanced cache off
    pub cache: Option<CacheConfig>,
    /// Connect and transfer timeout for each request
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            cache: CacheConfig::from_default_dir(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Creates a config for `endpoint` with the default cache location
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::default().with_endpoint(endpoint)
    }

    /// Reads `POSTEASE_ENDPOINT`, `POSTEASE_KEY`, `POSTEASE_CACHE_DIR` and
    /// `POSTEASE_NO_CACHE`
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the config from a variable lookup, starting from the defaults
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(endpoint) = var(ENDPOINT_ENV) {
            config = config.with_endpoint(endpoint);
        }
        if let Some(key) = var(API_KEY_ENV) {
            config = config.with_api_key(key);
        }
        if let Some(dir) = var(CACHE_DIR_ENV).filter(|d| !d.is_empty()) {
            config = config.with_cache_dir(dir);
        }
        let no_cache = var(NO_CACHE_ENV).is_some_and(|v| !v.is_empty() && v != "0");
        if no_cache {
            config = config.without_cache();
        }
        config
    }

    /// Sets the endpoint; an empty string leaves it unset
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint = (!endpoint.is_empty()).then_some(endpoint);
        self
    }

    /// Sets the default API key; an empty string leaves it unset
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.api_key = (!key.is_empty()).then_some(key);
        self
    }

    /// Roots the cache at `dir`
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(CacheConfig::new(dir));
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Turns the advanced cache off
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_endpoint_is_unset() {
        let config = ClientConfig::default().with_endpoint("");
        assert!(config.endpoint.is_none());
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::new("https://api.example.com/v1")
            .with_cache_dir("/tmp/postease-test")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.endpoint.as_deref(), Some("https://api.example.com/v1"));
        assert_eq!(
            config.cache.as_ref().map(|c| c.root().to_path_buf()),
            Some(PathBuf::from("/tmp/postease-test"))
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_without_cache() {
        let config = ClientConfig::new("http://localhost").without_cache();
        assert!(config.cache.is_none());
    }

    fn vars<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn test_from_vars_reads_every_variable() {
        let config = ClientConfig::from_vars(vars(&[
            ("POSTEASE_ENDPOINT", "https://api.example.com/v1"),
            ("POSTEASE_KEY", "site-key"),
            ("POSTEASE_CACHE_DIR", "/tmp/postease-env"),
        ]));

        assert_eq!(config.endpoint.as_deref(), Some("https://api.example.com/v1"));
        assert_eq!(config.api_key.as_deref(), Some("site-key"));
        assert_eq!(
            config.cache.as_ref().map(|c| c.root().to_path_buf()),
            Some(PathBuf::from("/tmp/postease-env"))
        );
    }

    #[test]
    fn test_from_vars_empty_values_are_unset() {
        let config = ClientConfig::from_vars(vars(&[
            ("POSTEASE_ENDPOINT", ""),
            ("POSTEASE_KEY", ""),
        ]));

        assert!(config.endpoint.is_none());
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_no_cache_variable() {
        let dir = ("POSTEASE_CACHE_DIR", "/tmp/postease-env");

        for off in ["1", "yes", "true"] {
            let config = ClientConfig::from_vars(vars(&[dir, ("POSTEASE_NO_CACHE", off)]));
            assert!(config.cache.is_none(), "POSTEASE_NO_CACHE={off:?}");
        }
        for on in ["", "0"] {
            let config = ClientConfig::from_vars(vars(&[dir, ("POSTEASE_NO_CACHE", on)]));
            assert!(config.cache.is_some(), "POSTEASE_NO_CACHE={on:?}");
        }
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(ClientConfig::default().timeout, Duration::from_secs(30));
    }
}

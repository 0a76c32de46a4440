//! Server-issued version tokens
//!
//! The reserved `advanced_cache` resource reports whether caching is allowed
//! and the generation token that governs the whole cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Generation marker for all cacheable data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wraps a raw token, trimming surrounding whitespace
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Parses marker file contents
    ///
    /// Returns `None` for blank contents so the caller re-bootstraps.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self::new(trimmed))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares numerically when both tokens are integers, textually otherwise
    pub fn matches(&self, other: &VersionToken) -> bool {
        match (self.as_integer(), other.as_integer()) {
            (Some(a), Some(b)) => a == b,
            _ => self.0 == other.0,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    /// Interprets an integer token as a Unix timestamp
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.as_integer()?, 0)
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of the `advanced_cache` resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionMetadata {
    /// Caching is allowed when this is greater than zero
    #[serde(default, deserialize_with = "lenient_int")]
    pub allow: i64,
    /// Current server-side generation token
    #[serde(default, deserialize_with = "lenient_token")]
    pub last_modified: Option<VersionToken>,
}

impl VersionMetadata {
    pub fn new(allow: i64, last_modified: Option<&str>) -> Self {
        Self {
            allow,
            last_modified: last_modified.and_then(VersionToken::parse),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allow > 0
    }

    /// Decodes a raw response body
    pub fn from_body(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Accepts `1`, `"1"`, `true`; anything else counts as zero
fn lenient_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Bool(b) => i64::from(b),
        _ => 0,
    })
}

/// Accepts the token as a JSON string or number
fn lenient_token<'de, D>(deserializer: D) -> Result<Option<VersionToken>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => VersionToken::parse(&s),
        Value::Number(n) => VersionToken::parse(&n.to_string()),
        _ => None,
    })
}

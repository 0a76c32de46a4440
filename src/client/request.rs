//! GET request descriptors
//!
//! A `GetRequest` is built once per call and carries everything the client
//! needs: resource, API key, params and the response shape to decode into.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

/// Value of the server-recognition flag sent with every request
pub const SSR_FLAG: &str = "1";

/// API keys of this form belong to preview sessions and are never cached
static PREVIEW_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]{32}$").expect("valid preview key pattern"));

/// Named resources exposed by the POSTEASE API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Archives,
    Categories,
    Comment,
    Comments,
    ContactItems,
    ImageFrames,
    Languages,
    Post,
    Posts,
    Posttypes,
    Sites,
    Tags,
    /// Reserved: version metadata for the advanced cache
    AdvancedCache,
}

impl Resource {
    /// Every resource that has a named getter
    pub const CATALOG: [Resource; 12] = [
        Resource::Archives,
        Resource::Categories,
        Resource::Comment,
        Resource::Comments,
        Resource::ContactItems,
        Resource::ImageFrames,
        Resource::Languages,
        Resource::Post,
        Resource::Posts,
        Resource::Posttypes,
        Resource::Sites,
        Resource::Tags,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Archives => "archives",
            Resource::Categories => "categories",
            Resource::Comment => "comment",
            Resource::Comments => "comments",
            Resource::ContactItems => "contact_items",
            Resource::ImageFrames => "image_frames",
            Resource::Languages => "languages",
            Resource::Post => "post",
            Resource::Posts => "posts",
            Resource::Posttypes => "posttypes",
            Resource::Sites => "sites",
            Resource::Tags => "tags",
            Resource::AdvancedCache => "advanced_cache",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::CATALOG
            .iter()
            .chain(std::iter::once(&Resource::AdvancedCache))
            .find(|r| r.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown resource '{}'", s))
    }
}

impl From<Resource> for String {
    fn from(resource: Resource) -> Self {
        resource.as_str().to_string()
    }
}

/// A single query parameter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    /// Sent comma-joined
    List(Vec<String>),
}

impl ParamValue {
    /// The value as sent on the wire: lists comma-joined, whitespace removed
    pub fn wire_value(&self) -> String {
        let joined = match self {
            ParamValue::Single(value) => value.clone(),
            ParamValue::List(values) => values.join(","),
        };
        joined.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(values: Vec<&str>) -> Self {
        ParamValue::List(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::List(values)
    }
}

macro_rules! param_value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ParamValue {
            fn from(value: $ty) -> Self {
                ParamValue::Single(value.to_string())
            }
        })*
    };
}

param_value_from_int!(i32, i64, u32, u64, usize);

/// Query params in caller order
///
/// Inserting a name that is already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[(String, ParamValue)] {
        &self.0
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

/// How a JSON response body is handed back to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ResponseShape {
    /// The JSON tree exactly as sent
    #[default]
    Object,
    /// Indexable containers: an object as an ordered field map, an array
    /// as its items
    Array,
}

impl ResponseShape {
    /// Decodes `body` without changing its structure
    ///
    /// Scalars decode to `Payload::Document` under either shape.
    pub fn decode(&self, body: &[u8]) -> Result<Payload, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(match (self, value) {
            (ResponseShape::Array, Value::Object(fields)) => Payload::Fields(fields),
            (ResponseShape::Array, Value::Array(items)) => Payload::Records(items),
            (_, value) => Payload::Document(value),
        })
    }
}

/// A decoded response body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Document(Value),
    /// Top-level object, keys in the order the server sent them
    Fields(Map<String, Value>),
    Records(Vec<Value>),
}

impl Payload {
    /// Looks up a top-level field; `None` for arrays and scalars
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Payload::Document(value) => value.get(name),
            Payload::Fields(fields) => fields.get(name),
            Payload::Records(_) => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Payload::Document(value) => value,
            Payload::Fields(fields) => Value::Object(fields),
            Payload::Records(items) => Value::Array(items),
        }
    }
}

/// Normalized view of a request, used to build the query string and the
/// cache key
#[derive(Debug, Clone, Copy)]
pub struct QuerySignature<'a> {
    ssr: bool,
    resource: Option<&'a str>,
    api_key: Option<&'a str>,
    params: &'a [(String, ParamValue)],
}

impl<'a> QuerySignature<'a> {
    pub fn new(
        ssr: bool,
        resource: Option<&'a str>,
        api_key: Option<&'a str>,
        params: &'a [(String, ParamValue)],
    ) -> Self {
        Self {
            ssr,
            resource: resource.filter(|r| !r.is_empty()),
            api_key: api_key.filter(|k| !k.is_empty()),
            params,
        }
    }

    /// Name/value pairs in fixed field order, values not yet URL-encoded
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(3 + self.params.len());
        if self.ssr {
            pairs.push(("ssr".to_string(), SSR_FLAG.to_string()));
        }
        if let Some(resource) = self.resource {
            pairs.push(("resource".to_string(), resource.to_string()));
        }
        if let Some(key) = self.api_key {
            pairs.push(("key".to_string(), key.to_string()));
        }
        for (name, value) in self.params {
            pairs.push((format!("params[{}]", name), value.wire_value()));
        }
        pairs
    }

    /// `?ssr=1&resource=..&key=..&params[name]=value`, or empty when every
    /// field is absent
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (name, value) in self.pairs() {
            out.push(if out.is_empty() { '?' } else { '&' });
            out.push_str(&name);
            out.push('=');
            out.push_str(&value);
        }
        out
    }
}

/// A single GET against the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    resource: String,
    api_key: Option<String>,
    params: Params,
    shape: ResponseShape,
}

impl GetRequest {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            api_key: None,
            params: Params::new(),
            shape: ResponseShape::default(),
        }
    }

    /// Sets the API key; an empty key is ignored
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.api_key = Some(key);
        }
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name, value);
        self
    }

    /// Replaces all params
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    /// The resource name, or `None` when empty
    pub fn resource(&self) -> Option<&str> {
        Some(self.resource.as_str()).filter(|r| !r.is_empty())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    pub fn signature(&self) -> QuerySignature<'_> {
        QuerySignature::new(
            true,
            self.resource(),
            self.api_key(),
            self.params.as_slice(),
        )
    }

    /// Pairs to send as the query string
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.signature().pairs()
    }

    /// Preview requests must never be read from or written to the cache
    ///
    /// The `preview` param counts when it is numerically 1 (`1`, `01`, `1.0`).
    pub fn is_preview(&self) -> bool {
        let flagged = self
            .params
            .get("preview")
            .and_then(|v| v.wire_value().parse::<f64>().ok())
            .is_some_and(|n| n == 1.0);
        let preview_key = self.api_key().is_some_and(|k| PREVIEW_KEY.is_match(k));
        flagged || preview_key
    }
}

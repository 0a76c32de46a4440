//! POSTEASE API client
//!
//! `PostEaseClient` sends GETs through the advanced cache and mail POSTs
//! straight to the endpoint. Both return decoded JSON or a `ClientError`
//! that renders to the same `ErrorResponse` shape.

pub mod mail;
pub mod request;
pub mod transport;

use std::borrow::Cow;

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheCoordinator, CacheState, CacheStore, VersionMetadata};
use crate::config::ClientConfig;
use crate::error::{ClientError, RequestContext};

pub use mail::{MailAction, MailRequest};
pub use request::{GetRequest, ParamValue, Params, Payload, Resource, ResponseShape};
pub use transport::{HttpResponse, HttpTransport, Transport, TransportError};

/// Client for the POSTEASE API
pub struct PostEaseClient {
    endpoint: Option<String>,
    api_key: Option<String>,
    transport: Box<dyn Transport>,
    cache: CacheCoordinator,
}

impl PostEaseClient {
    /// Creates a client backed by reqwest and runs the cache handshake
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let transport =
            HttpTransport::new(config.timeout).map_err(|e| ClientError::Connection {
                context: RequestContext::get(""),
                message: e.to_string(),
            })?;
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a client with a custom transport and runs the cache handshake
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        let cache = match config.cache {
            Some(cache_config) => CacheCoordinator::new(CacheStore::new(cache_config)),
            None => CacheCoordinator::without_store(),
        };
        let mut client = Self {
            endpoint: config.endpoint,
            api_key: config.api_key,
            transport: Box::new(transport),
            cache,
        };
        if client.cache.state() == CacheState::Uninitialized {
            client.prepare_cache();
        }
        client
    }

    /// Fetches version metadata without the cache and hands it to the
    /// coordinator
    fn prepare_cache(&mut self) {
        let request = GetRequest::new(Resource::AdvancedCache);
        let metadata = self.endpoint.as_deref().map(|endpoint| {
            fetch_body(self.transport.as_ref(), endpoint, &request).and_then(|body| {
                VersionMetadata::from_body(&body).map_err(|source| ClientError::Decode {
                    context: RequestContext::get(Resource::AdvancedCache),
                    source,
                })
            })
        });

        match metadata {
            Some(Ok(metadata)) => {
                self.cache.initialize_cache(&metadata);
            }
            Some(Err(e)) => {
                warn!(error = %e, "could not fetch cache version metadata");
                self.cache.disable("version metadata unavailable");
            }
            None => self.cache.disable("endpoint not set"),
        }
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    pub fn cache(&self) -> &CacheCoordinator {
        &self.cache
    }

    /// The on-disk store, if a cache directory is configured
    pub fn cache_store(&self) -> Option<&CacheStore> {
        self.cache.cache_store()
    }

    /// Deletes every cached response
    pub fn invalidate_cache(&self) -> Result<usize, ClientError> {
        Ok(self.cache.invalidate_all()?)
    }

    /// Executes a GET, serving it from the cache when possible
    pub fn get(&mut self, request: &GetRequest) -> Result<Payload, ClientError> {
        let context = RequestContext::get(request.resource().unwrap_or_default());
        if request.resource().is_none() {
            return Err(ClientError::InvalidRequest {
                context,
                message: "Resource not set".to_string(),
            });
        }
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(ClientError::InvalidRequest {
                context,
                message: "Endpoint not set".to_string(),
            });
        };

        let request = match (request.api_key(), &self.api_key) {
            (None, Some(key)) => Cow::Owned(request.clone().with_key(key.clone())),
            _ => Cow::Borrowed(request),
        };

        let transport = self.transport.as_ref();
        let body = self
            .cache
            .execute(&request, || fetch_body(transport, endpoint, &request))?;
        debug!(resource = %context.resource, from_cache = body.from_cache, "GET completed");

        request
            .shape()
            .decode(&body.bytes)
            .map_err(|source| ClientError::Decode { context, source })
    }

    /// GETs a catalog resource with the default shape
    pub fn resource(&mut self, resource: Resource, params: Params) -> Result<Payload, ClientError> {
        self.get(&GetRequest::new(resource).with_params(params))
    }

    pub fn archives(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Archives, params)
    }

    pub fn categories(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Categories, params)
    }

    pub fn comment(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Comment, params)
    }

    pub fn comments(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Comments, params)
    }

    pub fn contact_items(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::ContactItems, params)
    }

    pub fn image_frames(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::ImageFrames, params)
    }

    pub fn languages(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Languages, params)
    }

    pub fn post(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Post, params)
    }

    pub fn posts(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Posts, params)
    }

    pub fn posttypes(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Posttypes, params)
    }

    pub fn sites(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Sites, params)
    }

    pub fn tags(&mut self, params: Params) -> Result<Payload, ClientError> {
        self.resource(Resource::Tags, params)
    }

    /// Stores a contact form submission and mails it
    pub fn post_contact_send_mail(&self, mail: &MailRequest) -> Result<Payload, ClientError> {
        self.send(MailAction::PostContactSendMail, mail)
    }

    /// Sends a mail without storing a submission
    pub fn send_mail(&self, mail: &MailRequest) -> Result<Payload, ClientError> {
        self.send(MailAction::SendMail, mail)
    }

    /// POSTs a mail action; never touches the cache
    pub fn send(&self, action: MailAction, mail: &MailRequest) -> Result<Payload, ClientError> {
        let context = RequestContext::post(action.resource());
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(ClientError::InvalidRequest {
                context,
                message: "Endpoint not set".to_string(),
            });
        };

        debug!(action = action.as_str(), "POST");
        let response = self
            .transport
            .post_form(endpoint, &mail.form_fields(action))
            .map_err(|e| transport_failure(context.clone(), e))?;

        mail.shape()
            .decode(&response.body)
            .map_err(|source| ClientError::Decode { context, source })
    }
}

/// Runs one uncached GET and applies the status policy
///
/// Bodies with status >= 400 are errors unless they carry the server's own
/// `hasError` payload, which is handed back as data.
fn fetch_body(
    transport: &dyn Transport,
    endpoint: &str,
    request: &GetRequest,
) -> Result<Vec<u8>, ClientError> {
    let context = RequestContext::get(request.resource().unwrap_or_default());
    debug!(endpoint, resource = %context.resource, "GET");

    let response = transport
        .get(endpoint, &request.query_pairs())
        .map_err(|e| transport_failure(context.clone(), e))?;

    if response.status >= 400 && !has_error_payload(&response.body) {
        let message = if response.status == 404 {
            "Invalid endpoint (Check URL)"
        } else {
            "An unexpected error occurred"
        };
        return Err(ClientError::Server {
            context,
            status: response.status,
            message: message.to_string(),
        });
    }
    Ok(response.body)
}

fn transport_failure(context: RequestContext, error: TransportError) -> ClientError {
    match error {
        TransportError::Connect(message) => ClientError::Connection { context, message },
        TransportError::Transfer { status, message } => ClientError::Transport {
            context,
            status,
            message,
        },
    }
}

/// Whether the body is a JSON object with a truthy `hasError`
fn has_error_payload(body: &[u8]) -> bool {
    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return false;
    };
    match value.get("hasError") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty() && s != "0",
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    /// Canned responses keyed by resource, with a shared request log
    #[derive(Clone, Default)]
    struct FakeTransport {
        responses: Rc<RefCell<Vec<(String, Result<HttpResponse, String>)>>>,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl FakeTransport {
        fn respond(&self, resource: &str, status: u16, body: &str) {
            self.responses.borrow_mut().push((
                resource.to_string(),
                Ok(HttpResponse {
                    status,
                    body: body.as_bytes().to_vec(),
                }),
            ));
        }

        fn refuse(&self, resource: &str) {
            self.responses
                .borrow_mut()
                .push((resource.to_string(), Err("connection refused".to_string())));
        }

        fn hits(&self, resource: &str) -> usize {
            self.log.borrow().iter().filter(|r| *r == resource).count()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, _url: &str, query: &[(String, String)]) -> Result<HttpResponse, TransportError> {
            let resource = query
                .iter()
                .find(|(k, _)| k == "resource")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            self.log.borrow_mut().push(resource.clone());
            let responses = self.responses.borrow();
            match responses.iter().rev().find(|(r, _)| *r == resource) {
                Some((_, Ok(response))) => Ok(response.clone()),
                Some((_, Err(message))) => Err(TransportError::Connect(message.clone())),
                None => Ok(HttpResponse {
                    status: 404,
                    body: Vec::new(),
                }),
            }
        }

        fn post_form(
            &self,
            _url: &str,
            fields: &[(String, String)],
        ) -> Result<HttpResponse, TransportError> {
            let action = fields
                .iter()
                .find(|(k, _)| k == "action")
                .map(|(_, v)| v.clone())
                .unwrap_or_default();
            self.log.borrow_mut().push(action);
            Ok(HttpResponse {
                status: 200,
                body: br#"{"sent":1}"#.to_vec(),
            })
        }
    }

    fn client_with(transport: &FakeTransport, temp_dir: &TempDir) -> PostEaseClient {
        let config = ClientConfig::new("http://postease.test/api")
            .with_cache(CacheConfig::new(temp_dir.path().join("cache")));
        PostEaseClient::with_transport(config, transport.clone())
    }

    #[test]
    fn test_missing_resource_is_invalid() {
        let transport = FakeTransport::default();
        let temp_dir = TempDir::new().unwrap();
        let mut client = client_with(&transport, &temp_dir);

        let err = client.get(&GetRequest::new("")).unwrap_err();

        assert_eq!(err.to_response().error_message, "Resource not set");
    }

    #[test]
    fn test_missing_endpoint_is_invalid_and_disables_cache() {
        let transport = FakeTransport::default();
        let mut client = PostEaseClient::with_transport(
            ClientConfig::default().with_endpoint("").without_cache(),
            transport.clone(),
        );

        let err = client.get(&GetRequest::new("posts")).unwrap_err();

        assert_eq!(err.to_string(), "Endpoint not set");
        assert_eq!(client.cache_state(), CacheState::Disabled);
        assert_eq!(transport.hits("posts"), 0);
    }

    #[test]
    fn test_cache_hit_skips_transport() {
        let transport = FakeTransport::default();
        transport.respond("advanced_cache", 200, r#"{"allow":1,"last_modified":"10"}"#);
        transport.respond("tags", 200, r#"{"tags":["a","b"]}"#);
        let temp_dir = TempDir::new().unwrap();
        let mut client = client_with(&transport, &temp_dir);

        let first = client.tags(Params::new()).unwrap();
        let second = client.tags(Params::new()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.into_value(), json!({"tags": ["a", "b"]}));
        assert_eq!(transport.hits("tags"), 1);
    }

    #[test]
    fn test_metadata_failure_disables_cache_but_gets_still_work() {
        let transport = FakeTransport::default();
        transport.refuse("advanced_cache");
        transport.respond("posts", 200, r#"[{"id":1}]"#);
        let temp_dir = TempDir::new().unwrap();
        let mut client = client_with(&transport, &temp_dir);

        assert_eq!(client.cache_state(), CacheState::Disabled);
        client.posts(Params::new()).unwrap();
        client.posts(Params::new()).unwrap();

        assert_eq!(transport.hits("posts"), 2);
        assert!(!temp_dir.path().join("cache").exists());
    }

    #[test]
    fn test_server_error_without_payload() {
        let transport = FakeTransport::default();
        transport.respond("advanced_cache", 200, r#"{"allow":0}"#);
        transport.respond("sites", 500, "oops");
        let temp_dir = TempDir::new().unwrap();
        let mut client = client_with(&transport, &temp_dir);

        let err = client.sites(Params::new()).unwrap_err();

        let response = err.to_response();
        assert_eq!(response.http_status_code, 500);
        assert_eq!(response.error_message, "An unexpected error occurred");
        assert_eq!(response.resource, "sites");
    }

    #[test]
    fn test_server_error_payload_is_returned_and_cached() {
        let transport = FakeTransport::default();
        transport.respond("advanced_cache", 200, r#"{"allow":1,"last_modified":"10"}"#);
        transport.respond("post", 400, r#"{"hasError":1,"message":"post not found"}"#);
        let temp_dir = TempDir::new().unwrap();
        let mut client = client_with(&transport, &temp_dir);

        let payload = client.post(Params::new()).unwrap();
        client.post(Params::new()).unwrap();

        assert_eq!(payload.into_value()["message"], "post not found");
        assert_eq!(transport.hits("post"), 1);
    }

    #[test]
    fn test_connection_failure_maps_to_connection_error() {
        let transport = FakeTransport::default();
        transport.respond("advanced_cache", 200, r#"{"allow":0}"#);
        transport.refuse("languages");
        let temp_dir = TempDir::new().unwrap();
        let mut client = client_with(&transport, &temp_dir);

        let err = client.languages(Params::new()).unwrap_err();

        assert!(matches!(err, ClientError::Connection { .. }));
        assert_eq!(err.status_code(), 0);
    }

    #[test]
    fn test_default_api_key_is_applied() {
        let transport = FakeTransport::default();
        let temp_dir = TempDir::new().unwrap();
        transport.respond("advanced_cache", 200, r#"{"allow":1,"last_modified":"1"}"#);
        transport.respond("posts", 200, r#"{"posts":[]}"#);
        let config = ClientConfig::new("http://postease.test/api")
            .with_api_key("site-key")
            .with_cache(CacheConfig::new(temp_dir.path().join("cache")));
        let mut client = PostEaseClient::with_transport(config, transport.clone());

        client.posts(Params::new()).unwrap();

        let keyed = GetRequest::new("posts").with_key("site-key");
        let key = crate::cache::CacheKey::derive(&keyed.signature());
        let store = client.cache().cache_store().unwrap();
        assert!(store.read_entry(&key).unwrap().is_some());
    }

    #[test]
    fn test_mail_never_touches_cache() {
        let transport = FakeTransport::default();
        transport.respond("advanced_cache", 200, r#"{"allow":1,"last_modified":"1"}"#);
        let temp_dir = TempDir::new().unwrap();
        let client = client_with(&transport, &temp_dir);

        let mail = MailRequest::new().with_contact_data(json!({"name": "Ann"}));
        client.post_contact_send_mail(&mail).unwrap();
        client.send_mail(&mail).unwrap();

        assert_eq!(transport.hits("post_contact_send_mail"), 1);
        assert_eq!(transport.hits("send_mail"), 1);
        assert_eq!(client.cache_store().unwrap().entry_count().unwrap(), 0);
    }

    #[test]
    fn test_has_error_payload_truthiness() {
        assert!(has_error_payload(br#"{"hasError":1}"#));
        assert!(has_error_payload(br#"{"hasError":true}"#));
        assert!(has_error_payload(br#"{"hasError":"yes"}"#));
        assert!(!has_error_payload(br#"{"hasError":0}"#));
        assert!(!has_error_payload(br#"{"hasError":"0"}"#));
        assert!(!has_error_payload(br#"{"other":1}"#));
        assert!(!has_error_payload(b"not json"));
    }
}

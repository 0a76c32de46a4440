//! Client error types
//!
//! Every request failure carries the HTTP method and resource it belongs to,
//! and can be rendered as the `ErrorResponse` shape callers receive.

use serde::Serialize;
use thiserror::Error;

use crate::cache::StorageError;

/// HTTP method of the failing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Get,
    Post,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Method::Get => "get",
            Method::Post => "post",
        })
    }
}

/// Which request an error belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub method: Method,
    pub resource: String,
}

impl RequestContext {
    pub fn get(resource: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            resource: resource.into(),
        }
    }

    pub fn post(resource: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            resource: resource.into(),
        }
    }
}

/// Errors returned by `PostEaseClient`
#[derive(Debug, Error)]
pub enum ClientError {
    /// The endpoint could not be reached
    #[error("Connection failed ({} {}): {message}", .context.method, .context.resource)]
    Connection {
        context: RequestContext,
        message: String,
    },

    /// The request was sent but failed in transit
    #[error("Transport error ({} {}): {message}", .context.method, .context.resource)]
    Transport {
        context: RequestContext,
        status: Option<u16>,
        message: String,
    },

    /// The server answered with 4xx/5xx and no error payload of its own
    #[error("Server error {status} ({} {}): {message}", .context.method, .context.resource)]
    Server {
        context: RequestContext,
        status: u16,
        message: String,
    },

    /// The request was incomplete (no endpoint, no resource)
    #[error("{message}")]
    InvalidRequest {
        context: RequestContext,
        message: String,
    },

    /// The body was not valid JSON
    #[error("Failed to decode response ({} {}): {source}", .context.method, .context.resource)]
    Decode {
        context: RequestContext,
        #[source]
        source: serde_json::Error,
    },

    /// A cache maintenance call failed
    #[error("Cache storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ClientError {
    /// HTTP status code, or 0 when none was received
    pub fn status_code(&self) -> u16 {
        match self {
            ClientError::Transport { status, .. } => status.unwrap_or(0),
            ClientError::Server { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn context(&self) -> Option<&RequestContext> {
        match self {
            ClientError::Connection { context, .. }
            | ClientError::Transport { context, .. }
            | ClientError::Server { context, .. }
            | ClientError::InvalidRequest { context, .. }
            | ClientError::Decode { context, .. } => Some(context),
            ClientError::Storage(_) => None,
        }
    }

    /// Human-readable message without the method/resource prefix
    pub fn message(&self) -> String {
        match self {
            ClientError::Connection { message, .. }
            | ClientError::Transport { message, .. }
            | ClientError::Server { message, .. }
            | ClientError::InvalidRequest { message, .. } => message.clone(),
            ClientError::Decode { source, .. } => source.to_string(),
            ClientError::Storage(e) => e.to_string(),
        }
    }

    /// Renders the error as the structured response callers receive
    pub fn to_response(&self) -> ErrorResponse {
        let (method, resource) = match self.context() {
            Some(ctx) => (ctx.method, ctx.resource.clone()),
            None => (Method::Get, String::new()),
        };
        ErrorResponse {
            has_error: 1,
            http_status_code: self.status_code(),
            error_message: self.message(),
            method,
            resource,
        }
    }
}

/// Uniform error payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "hasError")]
    pub has_error: u8,
    pub http_status_code: u16,
    /// Serialized under the key existing POSTEASE clients read
    #[serde(rename = "error_massage")]
    pub error_message: String,
    pub method: Method,
    pub resource: String,
}

//! HTTP fetcher port
//!
//! Discovery, fetch and status calls go through this interface. The actual
//! transport (and TLS) is outside the core; tests use the in-memory
//! adapter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

/// A request as seen by an [`HttpClient`] implementation
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Full request URL, including any query string
    pub url: String,
    /// Form body for POST requests, `None` for GET
    pub form: Option<BTreeMap<String, String>>,
}

/// Minimal HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// `Content-Type` header value, if any
    pub content_type: Option<String>,
    /// Response body as text
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with the given body and content type
    pub fn ok(body: impl Into<String>, content_type: &str) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }
    }

    /// Whether the status code indicates success
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Port for outbound HTTP
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform a GET request
    async fn get(&self, url: &str) -> Result<HttpResponse, HttpError>;

    /// Perform a POST request with an urlencoded form body
    async fn post_form(
        &self,
        url: &str,
        form: &BTreeMap<String, String>,
    ) -> Result<HttpResponse, HttpError>;
}

/// Transport-level errors
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("no route for {0}")]
    NoRoute(String),

    #[error("HTTP status {status} from {url}")]
    Status { url: String, status: u16 },
}

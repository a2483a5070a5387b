use std::time::Duration;

use bytes::Bytes;

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Status and body of an API exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub content_type: Option<&'static str>,
    pub body: Bytes,
    /// Bound on the whole exchange, body included.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// GET with the parameters already in `url`.
    pub fn get(url: &str) -> Self {
        Self {
            method: http::Method::GET,
            url: url.to_string(),
            content_type: None,
            body: Bytes::new(),
            timeout: None,
        }
    }

    /// POST with an already url-encoded form body.
    pub fn post_form(url: &str, encoded: String) -> Self {
        Self {
            method: http::Method::POST,
            url: url.to_string(),
            content_type: Some(FORM_CONTENT_TYPE),
            body: Bytes::from(encoded),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

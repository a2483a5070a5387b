use std::time::Duration;

use csbench_http::{HttpClient, HttpRequest};

use crate::api::{ApiError, Reply, reply};
use crate::signing::SignedParams;

/// How signed parameters travel to the management server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString, strum::VariantNames,
)]
#[strum(serialize_all = "lowercase")]
pub enum RequestMethod {
    /// Url-encoded form body.
    #[default]
    Post,
    /// Query string appended to the endpoint URL.
    Get,
}

/// Management server endpoint all signed requests are sent to.
#[derive(Debug, Clone)]
pub struct ApiEndpoint {
    client: HttpClient,
    url: String,
    timeout: Option<Duration>,
    method: RequestMethod,
}

impl ApiEndpoint {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            client: HttpClient::default(),
            url: url.into(),
            timeout,
            method: RequestMethod::default(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    pub async fn send(&self, params: &SignedParams) -> Result<Reply, ApiError> {
        let req = match self.method {
            RequestMethod::Post => HttpRequest::post_form(&self.url, params.encoded().to_string()),
            RequestMethod::Get => HttpRequest::get(&query_url(&self.url, params.encoded())),
        };
        let res = self.client.request(req.with_timeout(self.timeout)).await?;
        reply::parse(res.status, &res.body)
    }
}

fn query_url(base: &str, encoded: &str) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{encoded}")
}

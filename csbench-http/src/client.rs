use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use super::util::{host_header_value, validate_url};
use super::{Error, HttpRequest, HttpResponse, Result};

const USER_AGENT_VALUE: &str = concat!("csbench/", env!("CARGO_PKG_VERSION"));

/// Pooled HTTP/1 client for management server calls; cheap to clone.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        // An unreachable management server would otherwise stall on the OS connect timeout.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut connector = HttpConnector::new();
        connector.enforce_http(false);
        connector.set_connect_timeout(connect_timeout);
        connector.set_nodelay(true);

        let tls = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector);

        Self {
            inner: Client::builder(TokioExecutor::new()).build(tls),
        }
    }

    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let parsed = validate_url(&req.url)?;
        let uri: hyper::Uri = req
            .url
            .parse()
            .map_err(|_| Error::InvalidUrl(req.url.clone()))?;

        let mut builder = Request::builder()
            .method(req.method)
            .uri(uri)
            .header(USER_AGENT, USER_AGENT_VALUE)
            .header(ACCEPT, "application/json");
        if let Some(host) = host_header_value(&parsed) {
            builder = builder.header(HOST, host);
        }
        if let Some(content_type) = req.content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if !req.body.is_empty() {
            builder = builder.header(CONTENT_LENGTH, req.body.len());
        }
        let outgoing = builder.body(Full::new(req.body))?;

        let exchange = async {
            let res = self.inner.request(outgoing).await?;
            let status = res.status().as_u16();
            let body = res.into_body().collect().await?.to_bytes();
            Ok::<_, Error>(HttpResponse { status, body })
        };

        match req.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => exchange.await,
        }
    }
}

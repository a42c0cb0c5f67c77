//! Forwarding of routed requests to the page server.

use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use http::{Method, StatusCode};
use portico_config::GatewayConfig;
use reqwest::redirect::Policy;
use reqwest::Client;

use crate::error::{GatewayError, GatewayResult};

/// Header naming the internal path a request was rewritten to.
pub static REWRITE_HEADER: HeaderName = HeaderName::from_static("x-portico-rewrite");

/// HTTP client for the page server.
///
/// Redirects from the page server are returned to the browser untouched,
/// never followed.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    upstream_url: String,
    timeout: Duration,
}

impl ProxyClient {
    /// Create a client for the configured upstream.
    pub fn new(config: &GatewayConfig) -> GatewayResult<Self> {
        let timeout = config.upstream_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .pool_max_idle_per_host(100)
            .build()
            .map_err(|e| GatewayError::server(format!("failed to create upstream client: {e}")))?;

        Ok(Self {
            client,
            upstream_url: config.upstream_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Forward a request to the upstream service.
    pub async fn forward(&self, request: ProxyRequest) -> GatewayResult<ProxyResponse> {
        let url = request.url(&self.upstream_url);

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(strip_hop_by_hop(&request.headers));
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::upstream(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        let headers = strip_hop_by_hop(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::upstream(format!("failed to read upstream body: {e}")))?;

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }

    /// Get the upstream URL.
    pub fn upstream_url(&self) -> &str {
        &self.upstream_url
    }

    /// Get the timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// A request bound for the page server.
#[derive(Debug)]
pub struct ProxyRequest {
    /// HTTP method.
    pub method: Method,
    /// Path to serve; the rewrite target when the chain rewrote.
    pub path: String,
    /// Original query string, without `?`.
    pub query: Option<String>,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl ProxyRequest {
    /// Create a request for `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Keep the browser's query string.
    #[must_use]
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query.filter(|q| !q.is_empty()).map(str::to_string);
        self
    }

    /// Set the request headers. `Host` is dropped so the client sets it.
    #[must_use]
    pub fn with_headers(mut self, mut headers: HeaderMap) -> Self {
        headers.remove(HOST);
        self.headers = headers;
        self
    }

    /// Set a single header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Full upstream URL: `{upstream}{path}?{query}`.
    pub fn url(&self, upstream_url: &str) -> String {
        match &self.query {
            Some(query) => format!("{upstream_url}{}?{query}", self.path),
            None => format!("{upstream_url}{}", self.path),
        }
    }
}

/// Response from upstream.
#[derive(Debug)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers, hop-by-hop headers removed.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
}

/// Check if a header is hop-by-hop (should not be forwarded).
pub fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Copy of `headers` without hop-by-hop headers.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

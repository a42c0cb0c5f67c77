//! Gateway HTTP server.
//!
//! Every inbound request runs through the application's stage chain. The
//! resulting decision is materialised here:
//!
//! | Decision | Response |
//! |---|---|
//! | `Redirect` | `307` with `Location`, nothing forwarded |
//! | `Rewrite(path)` | forwarded to `{upstream}{path}?{query}`, `x-portico-rewrite` set |
//! | `PassThrough` | forwarded to `{upstream}{original path}?{query}` |
//!
//! Paths under `/_portico/` are served by the gateway itself.

use std::convert::Infallible;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use portico_config::PorticoConfig;
use portico_core::{RequestId, RouteDecision, RouteRequest, REQUEST_ID_HEADER};
use portico_middleware::{
    AppProfile, HttpRegistrationBackend, SessionTokenResolver, StageChain, StageContext,
};
use portico_telemetry::render_metrics;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::{ErrorResponse, GatewayError, GatewayResult};
use crate::health::HealthChecker;
use crate::proxy::{ProxyClient, ProxyRequest, REWRITE_HEADER};

/// Prefix of the gateway's own endpoints.
pub const INTERNAL_PREFIX: &str = "/_portico/";

/// Builds the application profile described by `config`.
pub fn app_profile(config: &PorticoConfig) -> GatewayResult<AppProfile> {
    let kind = config.app.profile;
    let profile = AppProfile::by_name(kind.as_str())
        .ok_or_else(|| GatewayError::config(format!("no routing profile for application {kind}")))?;

    Ok(profile
        .with_base_path(config.app.base_path())
        .with_onboarding_path(config.app.onboarding_path.clone())
        .with_exempt_prefixes(config.app.exempt_prefixes.clone())
        .with_rule_timeout(config.backend.rule_timeout()))
}

/// Gateway server.
pub struct GatewayServer {
    config: Arc<PorticoConfig>,
    service: Arc<GatewayService>,
}

impl GatewayServer {
    /// Create a server with the session resolver and backend client the
    /// configuration describes.
    pub fn new(config: PorticoConfig) -> GatewayResult<Self> {
        let profile = app_profile(&config)?;

        let resolver = SessionTokenResolver::new(config.session.secret.as_bytes())
            .with_cookie_names(config.session.cookie_names.clone())
            .with_bearer(config.session.allow_bearer);
        let backend = HttpRegistrationBackend::new(
            config.backend.api_url.clone(),
            config.backend.request_timeout(),
        )?;

        let chain = profile.build_chain(Arc::new(resolver), Arc::new(backend));
        Self::with_chain(config, chain)
    }

    /// Create a server around a prebuilt chain.
    pub fn with_chain(config: PorticoConfig, chain: StageChain) -> GatewayResult<Self> {
        let proxy = ProxyClient::new(&config.gateway)?;
        let health = HealthChecker::new(chain.label(), proxy.upstream_url())?;
        let service = Arc::new(GatewayService {
            chain,
            proxy,
            health,
        });

        Ok(Self {
            config: Arc::new(config),
            service,
        })
    }

    /// The request handler shared by all connections.
    pub fn service(&self) -> Arc<GatewayService> {
        self.service.clone()
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(self) -> GatewayResult<()> {
        let addr: SocketAddr = self
            .config
            .gateway
            .listen_addr
            .parse()
            .map_err(|e| GatewayError::config(format!("invalid listen address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::server(format!("failed to bind {addr}: {e}")))?;

        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> GatewayResult<()> {
        let addr = listener.local_addr()?;
        info!(
            listen = %addr,
            app = self.service.chain.label(),
            upstream = self.service.proxy.upstream_url(),
            "portico gateway listening"
        );

        self.service.health.set_ready(true);

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let service = self.service.clone();

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let handler = service_fn(move |req| {
                    let service = service.clone();
                    async move { Ok::<_, Infallible>(service.handle(req, Some(peer_addr)).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, handler).await {
                    debug!("Connection error: {}", e);
                }
            });
        }
    }
}

/// Routes one request and produces the HTTP response.
pub struct GatewayService {
    chain: StageChain,
    proxy: ProxyClient,
    health: HealthChecker,
}

impl GatewayService {
    /// The application's chain.
    pub fn chain(&self) -> &StageChain {
        &self.chain
    }

    /// The health checker.
    pub fn health(&self) -> &HealthChecker {
        &self.health
    }

    /// Handle an inbound request.
    pub async fn handle<B>(&self, req: Request<B>, peer: Option<SocketAddr>) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        let request_id = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default();
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            path = %path,
            peer = ?peer,
        );

        async move {
            let mut response = match path.strip_prefix(INTERNAL_PREFIX) {
                Some(endpoint) => self.internal(endpoint, request_id).await,
                None => self.route(req, request_id).await,
            };

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().entry(REQUEST_ID_HEADER).or_insert(value);
            }
            response
        }
        .instrument(span)
        .await
    }

    async fn route<B>(&self, req: Request<B>, request_id: RequestId) -> Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        let start = Instant::now();
        let (parts, body) = req.into_parts();
        let route_request = RouteRequest::from_parts(&parts.uri, parts.headers.clone());

        let mut ctx = StageContext::with_request_id(request_id);
        let (decision, route_headers) = self.chain.process(&mut ctx, &route_request).await.into_parts();

        let (target, rewritten) = match decision {
            RouteDecision::Redirect { location, status } => {
                info!(status = status.as_u16(), location = %location, "redirect");
                let mut response = redirect_response(status, &location, request_id);
                merge_headers(response.headers_mut(), &route_headers);
                return response;
            }
            RouteDecision::Rewrite(target) => (target, true),
            RouteDecision::PassThrough => (route_request.path().to_string(), false),
        };

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!("Failed to read request body: {}", e);
                return gateway_error_response(
                    &GatewayError::bad_request("failed to read request body"),
                    request_id,
                );
            }
        };

        let mut proxy_request = ProxyRequest::new(parts.method, target.clone())
            .with_query(parts.uri.query())
            .with_headers(parts.headers)
            .with_body(body);
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            proxy_request =
                proxy_request.with_header(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        match self.proxy.forward(proxy_request).await {
            Ok(upstream) => {
                info!(
                    status = upstream.status.as_u16(),
                    target = %target,
                    duration_ms = %start.elapsed().as_millis(),
                    "request completed"
                );

                let mut response = Response::new(Full::new(upstream.body));
                *response.status_mut() = upstream.status;
                *response.headers_mut() = upstream.headers;
                if rewritten {
                    if let Ok(value) = HeaderValue::from_str(&target) {
                        response.headers_mut().insert(REWRITE_HEADER.clone(), value);
                    }
                }
                merge_headers(response.headers_mut(), &route_headers);
                response
            }
            Err(e) => {
                error!(
                    error = %e,
                    target = %target,
                    duration_ms = %start.elapsed().as_millis(),
                    "proxy error"
                );
                gateway_error_response(&e, request_id)
            }
        }
    }

    async fn internal(&self, endpoint: &str, request_id: RequestId) -> Response<Full<Bytes>> {
        match endpoint {
            "health" => json_response(StatusCode::OK, &self.health.liveness()),
            "ready" => {
                let readiness = self.health.readiness().await;
                let status = if readiness.status.is_ready() {
                    StatusCode::OK
                } else {
                    StatusCode::SERVICE_UNAVAILABLE
                };
                json_response(status, &readiness)
            }
            "metrics" => match render_metrics() {
                Some(text) => {
                    let mut response = Response::new(Full::new(Bytes::from(text)));
                    response.headers_mut().insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static("text/plain; version=0.0.4"),
                    );
                    response
                }
                None => error_response(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "metrics",
                    "metrics recorder not installed",
                    request_id,
                ),
            },
            "version" => json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": crate::VERSION,
                    "app": self.chain.label(),
                    "stages": self.chain.stage_names(),
                }),
            ),
            other => error_response(
                StatusCode::NOT_FOUND,
                "not_found",
                &format!("unknown internal endpoint: {INTERNAL_PREFIX}{other}"),
                request_id,
            ),
        }
    }
}

fn merge_headers(target: &mut HeaderMap, extra: &HeaderMap) {
    for (name, value) in extra {
        target.insert(name.clone(), value.clone());
    }
}

fn redirect_response(status: StatusCode, location: &str, request_id: RequestId) -> Response<Full<Bytes>> {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = status;
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "redirect target is not a valid header value",
            request_id,
        ),
    }
}

/// Create a JSON response.
fn json_response<T: serde::Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Create an error response.
fn error_response(
    status: StatusCode,
    error: &str,
    message: &str,
    request_id: RequestId,
) -> Response<Full<Bytes>> {
    let body = ErrorResponse::new(error, message).with_request_id(request_id.to_string());
    json_response(status, &body)
}

fn gateway_error_response(err: &GatewayError, request_id: RequestId) -> Response<Full<Bytes>> {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
    let body = ErrorResponse::from(err).with_request_id(request_id.to_string());
    json_response(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_config::{AppConfig, AppKind};

    #[test]
    fn test_redirect_response() {
        let response = redirect_response(
            StatusCode::TEMPORARY_REDIRECT,
            "/onboarding",
            RequestId::new(),
        );
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[LOCATION], "/onboarding");
    }

    #[test]
    fn test_invalid_redirect_target() {
        let response = redirect_response(StatusCode::TEMPORARY_REDIRECT, "/a\nb", RequestId::new());
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_gateway_error_response_status() {
        let response = gateway_error_response(&GatewayError::upstream("refused"), RequestId::new());
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_merge_headers_overrides() {
        let mut target = HeaderMap::new();
        target.insert("cache-control", HeaderValue::from_static("max-age=60"));
        let mut extra = HeaderMap::new();
        extra.insert("cache-control", HeaderValue::from_static("no-store"));

        merge_headers(&mut target, &extra);
        assert_eq!(target["cache-control"], "no-store");
    }

    #[test]
    fn test_app_profile_follows_config() {
        let config = PorticoConfig::builder()
            .app(AppConfig {
                profile: AppKind::Registration,
                base_path: Some("/reg".to_string()),
                ..AppConfig::default()
            })
            .build();

        let profile = app_profile(&config).unwrap();
        assert_eq!(profile.label(), "registration");
        assert_eq!(profile.base_path(), "/reg");
        assert!(profile.has_rules());
    }
}

//! Registration backend client.
//!
//! Business rules need two facts about a user: their current user-operator
//! record and, when none exists yet, their pending access request. Both are
//! fetched fresh on every evaluation.
//!
//! | Call | Endpoint |
//! |---|---|
//! | [`RegistrationBackend::current_user_operator`] | `GET {API_URL}/registration/user-operators/current` |
//! | [`RegistrationBackend::pending_user_operator`] | `GET {API_URL}/registration/user-operators/pending` |
//!
//! A 404 means "no record" and yields `Ok(None)`.

use crate::stage::BoxFuture;
use portico_core::{BusinessRuleContext, PorticoError};
use portico_telemetry::metrics::record_backend_fetch;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors raised while fetching business-rule facts.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The HTTP client could not be constructed.
    #[error("failed to build backend client: {0}")]
    Client(String),

    /// The request failed before a response arrived.
    #[error("request to {endpoint} failed: {message}")]
    Request {
        /// Endpoint label.
        endpoint: &'static str,
        /// Underlying error text.
        message: String,
    },

    /// The evaluation did not finish in time.
    #[error("backend did not answer within {after:?}")]
    Timeout {
        /// The configured bound.
        after: Duration,
    },

    /// The backend answered with an unexpected status.
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        /// Endpoint label.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
    },

    /// The body was not a valid user-operator record.
    #[error("{endpoint} returned an invalid payload: {message}")]
    InvalidPayload {
        /// Endpoint label.
        endpoint: &'static str,
        /// Parser error text.
        message: String,
    },
}

impl From<BackendError> for PorticoError {
    fn from(err: BackendError) -> Self {
        Self::backend_unavailable(err.to_string())
    }
}

/// Source of business-rule facts.
pub trait RegistrationBackend: Send + Sync + 'static {
    /// The user's current user-operator record.
    fn current_user_operator<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>>;

    /// The user's pending access request.
    fn pending_user_operator<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>>;
}

/// Endpoint label and path for the current record.
const CURRENT: (&str, &str) = ("current", "/registration/user-operators/current");

/// Endpoint label and path for the pending record.
const PENDING: (&str, &str) = ("pending", "/registration/user-operators/pending");

/// [`RegistrationBackend`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRegistrationBackend {
    client: Client,
    api_url: String,
}

impl HttpRegistrationBackend {
    /// Creates a client for `api_url` with a per-request timeout.
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Returns the configured base URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }

    async fn fetch(
        &self,
        (endpoint, path): (&'static str, &'static str),
        user_id: &str,
    ) -> BackendResult<Option<BusinessRuleContext>> {
        let start = Instant::now();
        let result = self.fetch_inner(endpoint, path, user_id).await;
        record_backend_fetch(endpoint, result.is_ok(), start.elapsed());
        result
    }

    async fn fetch_inner(
        &self,
        endpoint: &'static str,
        path: &str,
        user_id: &str,
    ) -> BackendResult<Option<BusinessRuleContext>> {
        let identity = serde_json::json!({ "user_guid": user_id }).to_string();

        let response = self
            .client
            .get(self.url_for(path))
            .header(reqwest::header::AUTHORIZATION, identity)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| BackendError::Request {
                endpoint,
                message: e.to_string(),
            })?;

        let status = response.status();
        debug!(endpoint, status = status.as_u16(), "backend responded");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BackendError::Status {
                endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| BackendError::Request {
            endpoint,
            message: e.to_string(),
        })?;

        serde_json::from_slice::<BusinessRuleContext>(&body)
            .map(Some)
            .map_err(|e| BackendError::InvalidPayload {
                endpoint,
                message: e.to_string(),
            })
    }
}

impl RegistrationBackend for HttpRegistrationBackend {
    fn current_user_operator<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
        Box::pin(self.fetch(CURRENT, user_id))
    }

    fn pending_user_operator<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
        Box::pin(self.fetch(PENDING, user_id))
    }
}

/// An in-process backend keyed by user ID, for tests and local runs.
///
/// Counts every fetch so callers can assert that nothing is memoised.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    current: HashMap<String, BusinessRuleContext>,
    pending: HashMap<String, BusinessRuleContext>,
    failure: Option<u16>,
    fetches: AtomicUsize,
}

impl InMemoryBackend {
    /// An empty backend: every lookup is "no record".
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the current record for `user_id`.
    #[must_use]
    pub fn with_current(mut self, user_id: impl Into<String>, facts: BusinessRuleContext) -> Self {
        self.current.insert(user_id.into(), facts);
        self
    }

    /// Sets the pending record for `user_id`.
    #[must_use]
    pub fn with_pending(mut self, user_id: impl Into<String>, facts: BusinessRuleContext) -> Self {
        self.pending.insert(user_id.into(), facts);
        self
    }

    /// Makes every call fail with the given HTTP status.
    #[must_use]
    pub fn failing(mut self, status: u16) -> Self {
        self.failure = Some(status);
        self
    }

    /// Number of fetches served so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn lookup(
        &self,
        endpoint: &'static str,
        table: &HashMap<String, BusinessRuleContext>,
        user_id: &str,
    ) -> BackendResult<Option<BusinessRuleContext>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(status) => Err(BackendError::Status { endpoint, status }),
            None => Ok(table.get(user_id).cloned()),
        }
    }
}

impl RegistrationBackend for InMemoryBackend {
    fn current_user_operator<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
        let result = self.lookup(CURRENT.0, &self.current, user_id);
        Box::pin(async move { result })
    }

    fn pending_user_operator<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
        let result = self.lookup(PENDING.0, &self.pending, user_id);
        Box::pin(async move { result })
    }
}

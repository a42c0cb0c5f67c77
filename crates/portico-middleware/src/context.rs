//! Per-request context threaded through the stage chain.
//!
//! The [`StageContext`] replaces any module-level state: claims resolved by
//! the authorization stage and the pending rewrite travel with the request
//! and are dropped with it.

use portico_core::{AuthClaims, RequestId};
use std::time::{Duration, Instant};

/// Mutable state shared by the stages of a single request.
///
/// # Example
///
/// ```
/// use portico_middleware::StageContext;
///
/// let mut ctx = StageContext::new();
/// assert!(!ctx.is_authenticated());
/// ctx.set_rewrite("/administration/idir/cas_admin/operations");
/// assert_eq!(ctx.rewrite(), Some("/administration/idir/cas_admin/operations"));
/// ```
#[derive(Debug)]
pub struct StageContext {
    request_id: RequestId,
    claims: Option<AuthClaims>,
    rewrite: Option<String>,
    visited: Vec<&'static str>,
    started_at: Instant,
}

impl StageContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            claims: None,
            rewrite: None,
            visited: Vec::new(),
            started_at: Instant::now(),
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the resolved claims, if the caller is authenticated.
    #[must_use]
    pub fn claims(&self) -> Option<&AuthClaims> {
        self.claims.as_ref()
    }

    /// Records the caller's claims.
    ///
    /// Only the authorization stage calls this.
    pub fn set_claims(&mut self, claims: AuthClaims) {
        self.claims = Some(claims);
    }

    /// True once claims are recorded.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }

    /// Returns the pending rewrite target.
    #[must_use]
    pub fn rewrite(&self) -> Option<&str> {
        self.rewrite.as_deref()
    }

    /// Records the internal path the page layer should serve.
    pub fn set_rewrite(&mut self, path: impl Into<String>) {
        self.rewrite = Some(path.into());
    }

    /// Names of the stages entered so far, in order.
    #[must_use]
    pub fn visited(&self) -> &[&'static str] {
        &self.visited
    }

    pub(crate) fn record_stage(&mut self, name: &'static str) {
        self.visited.push(name);
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for StageContext {
    fn default() -> Self {
        Self::new()
    }
}

//! Authentication gate and role dispatch.
//!
//! The first stage of every chain. Requests for the onboarding page and
//! for exempt prefixes (framework assets, the favicon) are not intercepted
//! and end here with `PassThrough`. For everything else it resolves the
//! session, then:
//!
//! | Session | Final segment allow-listed | Outcome |
//! |---|---|---|
//! | absent / expired / malformed | yes | next stage, no claims, no rewrite |
//! | absent / expired / malformed | no | `Redirect(onboarding)`, chain ends |
//! | valid | yes | claims recorded, next stage, no rewrite |
//! | valid | no | claims and role rewrite recorded, next stage |
//!
//! Later stages must not assume claims are present.

use crate::context::StageContext;
use crate::paths::role_rewrite;
use crate::stage::{BoxFuture, Next, Stage};
use crate::token::{SessionError, TokenResolver};
use portico_core::{RouteRequest, RouteResponse};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default destination for unauthenticated callers.
pub const DEFAULT_ONBOARDING_PATH: &str = "/onboarding";

/// Path prefixes that are never intercepted unless overridden.
pub const DEFAULT_EXEMPT_PREFIXES: &[&str] = &["/_next/", "/favicon.ico"];

/// The authorization stage.
///
/// # Example
///
/// ```ignore
/// let stage = AuthorizationStage::new(resolver, "/administration")
///     .allow("profile")
///     .with_onboarding_path("/onboarding");
/// ```
pub struct AuthorizationStage {
    resolver: Arc<dyn TokenResolver>,
    base_path: String,
    onboarding_path: String,
    allow_list: BTreeSet<String>,
    exempt_prefixes: Vec<String>,
}

impl AuthorizationStage {
    /// Creates the stage for an application mounted at `base_path`.
    #[must_use]
    pub fn new(resolver: Arc<dyn TokenResolver>, base_path: impl Into<String>) -> Self {
        Self {
            resolver,
            base_path: base_path.into(),
            onboarding_path: DEFAULT_ONBOARDING_PATH.to_string(),
            allow_list: BTreeSet::new(),
            exempt_prefixes: DEFAULT_EXEMPT_PREFIXES
                .iter()
                .map(|prefix| (*prefix).to_string())
                .collect(),
        }
    }

    /// Adds a final path segment that skips role dispatch.
    #[must_use]
    pub fn allow(mut self, segment: impl Into<String>) -> Self {
        self.allow_list.insert(segment.into());
        self
    }

    /// Sets where unauthenticated callers are redirected.
    #[must_use]
    pub fn with_onboarding_path(mut self, path: impl Into<String>) -> Self {
        self.onboarding_path = path.into();
        self
    }

    /// Replaces the exempt path prefixes.
    #[must_use]
    pub fn with_exempt_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exempt_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// True when the request is outside the intercepted routes: the
    /// onboarding page (and anything below it) or an exempt prefix.
    #[must_use]
    pub fn is_exempt(&self, request: &RouteRequest) -> bool {
        let path = request.path();
        let onboarding = self.onboarding_path.trim_end_matches('/');
        let under_onboarding = !onboarding.is_empty()
            && (path == onboarding
                || path
                    .strip_prefix(onboarding)
                    .is_some_and(|rest| rest.starts_with('/')));

        under_onboarding
            || self
                .exempt_prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// True when the request's final segment is allow-listed.
    #[must_use]
    pub fn is_allow_listed(&self, request: &RouteRequest) -> bool {
        request
            .final_segment()
            .is_some_and(|segment| self.allow_list.contains(segment))
    }

    fn reject(&self, ctx: &StageContext, request: &RouteRequest, err: &SessionError) -> RouteResponse {
        match err {
            SessionError::Absent => debug!(
                request_id = %ctx.request_id(),
                http.path = request.path(),
                "no session, redirecting to onboarding"
            ),
            other => warn!(
                request_id = %ctx.request_id(),
                http.path = request.path(),
                reason = other.reason(),
                error = %other,
                "session rejected, redirecting to onboarding"
            ),
        }
        RouteResponse::redirect(self.onboarding_path.clone())
    }
}

impl Stage for AuthorizationStage {
    fn name(&self) -> &'static str {
        "authorization"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut StageContext,
        request: &'a RouteRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, RouteResponse> {
        Box::pin(async move {
            if self.is_exempt(request) {
                debug!(
                    request_id = %ctx.request_id(),
                    http.path = request.path(),
                    "exempt path, not intercepted"
                );
                return RouteResponse::pass_through();
            }

            let session = self.resolver.resolve(request).await;
            let allow_listed = self.is_allow_listed(request);

            let claims = match session {
                Ok(claims) => claims,
                Err(_) if allow_listed => {
                    debug!(
                        request_id = %ctx.request_id(),
                        http.path = request.path(),
                        "allow-listed path, continuing unauthenticated"
                    );
                    return next.run(ctx, request).await;
                }
                Err(err) => return self.reject(ctx, request, &err),
            };

            if !allow_listed {
                let target = role_rewrite(&self.base_path, request.path(), claims.namespace());
                debug!(
                    request_id = %ctx.request_id(),
                    http.path = request.path(),
                    rewrite = %target,
                    "role rewrite"
                );
                ctx.set_rewrite(target);
            }

            debug!(
                request_id = %ctx.request_id(),
                user_id = claims.user_id(),
                namespace = %claims.namespace(),
                "authenticated"
            );
            ctx.set_claims(claims);

            next.run(ctx, request).await
        })
    }
}

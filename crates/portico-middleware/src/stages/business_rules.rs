//! Backend-driven business rules.
//!
//! Runs an application's [`RuleSet`] for authenticated BCeID Business
//! callers whose path falls in the rule set's protected family. IDIR staff
//! have no operator and skip the rules.
//!
//! The facts fetch is bounded by a timeout. A failed or expired fetch never
//! escapes the chain: it becomes a fail-safe redirect to the application
//! root.

use crate::backend::{BackendError, RegistrationBackend};
use crate::context::StageContext;
use crate::paths::strip_base;
use crate::rules::{RuleOutcome, RuleSet};
use crate::stage::{BoxFuture, Next, Stage};
use portico_core::{join_path, PorticoError, RouteRequest, RouteResponse};
use portico_telemetry::metrics::record_fail_safe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on a business-rule fetch.
pub const DEFAULT_RULE_TIMEOUT: Duration = Duration::from_secs(8);

/// The business-rule stage.
pub struct BusinessRuleStage {
    app: &'static str,
    base_path: String,
    rules: Arc<dyn RuleSet>,
    backend: Arc<dyn RegistrationBackend>,
    timeout: Duration,
}

impl BusinessRuleStage {
    /// Creates the stage. `app` labels logs and metrics.
    #[must_use]
    pub fn new(
        app: &'static str,
        base_path: impl Into<String>,
        rules: Arc<dyn RuleSet>,
        backend: Arc<dyn RegistrationBackend>,
    ) -> Self {
        Self {
            app,
            base_path: base_path.into(),
            rules,
            backend,
            timeout: DEFAULT_RULE_TIMEOUT,
        }
    }

    /// Sets the fetch timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The fail-safe destination.
    #[must_use]
    pub fn app_root(&self) -> String {
        join_path(&self.base_path, "")
    }

    fn fail_safe(&self, ctx: &StageContext, request: &RouteRequest, err: &PorticoError) -> RouteResponse {
        let category = err.category();
        record_fail_safe(self.app, category.as_str());
        warn!(
            request_id = %ctx.request_id(),
            http.path = request.path(),
            rule_set = self.rules.name(),
            category = category.as_str(),
            error = %err,
            "business rules unavailable, fail-safe redirect"
        );
        RouteResponse::redirect(self.app_root())
    }

    fn materialise(&self, path: &str, query: Option<&str>) -> String {
        let location = join_path(&self.base_path, path);
        match query {
            Some(query) => format!("{location}?{query}"),
            None => location,
        }
    }
}

impl Stage for BusinessRuleStage {
    fn name(&self) -> &'static str {
        "business_rules"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut StageContext,
        request: &'a RouteRequest,
        next: Next<'a>,
    ) -> BoxFuture<'a, RouteResponse> {
        Box::pin(async move {
            let Some(claims) = ctx.claims().cloned() else {
                return next.run(ctx, request).await;
            };

            if !claims.is_industry_user() {
                debug!(request_id = %ctx.request_id(), "staff caller, rules skipped");
                return next.run(ctx, request).await;
            }

            let rest = strip_base(&self.base_path, request.path());
            if !self.rules.protects(rest) {
                return next.run(ctx, request).await;
            }

            let fetch = self.rules.fetch_facts(self.backend.as_ref(), claims.user_id());
            let facts = match tokio::time::timeout(self.timeout, fetch).await {
                Ok(Ok(facts)) => facts,
                Ok(Err(err)) => return self.fail_safe(ctx, request, &err.into()),
                Err(_) => {
                    let err = BackendError::Timeout { after: self.timeout };
                    return self.fail_safe(ctx, request, &err.into());
                }
            };

            match self.rules.decide(rest, facts.as_ref()) {
                RuleOutcome::Continue => {
                    debug!(
                        request_id = %ctx.request_id(),
                        rule_set = self.rules.name(),
                        "rules satisfied"
                    );
                    next.run(ctx, request).await
                }
                RuleOutcome::Redirect { path, query } => {
                    let location = self.materialise(&path, query.as_deref());
                    debug!(
                        request_id = %ctx.request_id(),
                        rule_set = self.rules.name(),
                        user_id = claims.user_id(),
                        location = %location,
                        "rule redirect"
                    );
                    RouteResponse::redirect(location)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendResult, InMemoryBackend};
    use crate::chain::StageChain;
    use crate::rules::OperationsAccess;
    use portico_core::{
        AuthClaims, BusinessRuleContext, OperatorStatus, RouteDecision, UserOperatorStatus,
    };

    struct Hanging;

    impl RegistrationBackend for Hanging {
        fn current_user_operator<'a>(
            &'a self,
            _user_id: &'a str,
        ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
            Box::pin(std::future::pending())
        }

        fn pending_user_operator<'a>(
            &'a self,
            _user_id: &'a str,
        ) -> BoxFuture<'a, BackendResult<Option<BusinessRuleContext>>> {
            Box::pin(std::future::pending())
        }
    }

    fn draft() -> BusinessRuleContext {
        BusinessRuleContext::new(
            UserOperatorStatus::Approved,
            "op-1",
            OperatorStatus::Draft,
            "Alpha Inc.",
        )
    }

    async fn run(
        backend: Arc<dyn RegistrationBackend>,
        claims: AuthClaims,
        path: &str,
    ) -> RouteResponse {
        let stage = BusinessRuleStage::new(
            "administration",
            "/administration",
            Arc::new(OperationsAccess),
            backend,
        )
        .with_timeout(Duration::from_millis(50));
        let chain = StageChain::builder("test").stage(stage).build();
        let mut ctx = StageContext::new();
        ctx.set_claims(claims);
        chain.process(&mut ctx, &RouteRequest::new(path)).await
    }

    fn industry() -> AuthClaims {
        AuthClaims::parse("bceidbusiness", "industry_user", "u1").unwrap()
    }

    #[tokio::test]
    async fn test_draft_operator_redirected_to_root() {
        let backend = Arc::new(InMemoryBackend::new().with_current("u1", draft()));
        let response = run(backend, industry(), "/administration/operations").await;
        assert_eq!(response.decision(), &RouteDecision::redirect("/administration"));
    }

    #[tokio::test]
    async fn test_unprotected_path_skips_fetch() {
        let backend = Arc::new(InMemoryBackend::new());
        let response = run(backend.clone(), industry(), "/administration/contacts").await;
        assert_eq!(response.decision(), &RouteDecision::PassThrough);
        assert_eq!(backend.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_staff_bypass_rules() {
        let backend = Arc::new(InMemoryBackend::new());
        let staff = AuthClaims::parse("idir", "cas_analyst", "s1").unwrap();
        let response = run(backend.clone(), staff, "/administration/operations").await;
        assert_eq!(response.decision(), &RouteDecision::PassThrough);
        assert_eq!(backend.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_is_fail_safe() {
        let backend = Arc::new(InMemoryBackend::new().failing(500));
        let response = run(backend, industry(), "/administration/operations").await;
        assert_eq!(response.decision(), &RouteDecision::redirect("/administration"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_fail_safe() {
        let response = run(Arc::new(Hanging), industry(), "/administration/operations").await;
        assert_eq!(response.decision(), &RouteDecision::redirect("/administration"));
    }

    #[test]
    fn test_materialise_with_query() {
        let stage = BusinessRuleStage::new(
            "registration",
            "/registration",
            Arc::new(OperationsAccess),
            Arc::new(InMemoryBackend::new()),
        );
        assert_eq!(
            stage.materialise("/select-operator/received/request-access/7", Some("title=A+B")),
            "/registration/select-operator/received/request-access/7?title=A+B"
        );
        assert_eq!(stage.materialise("/", None), "/registration");
    }
}

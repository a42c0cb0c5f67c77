//! End-to-end routing scenarios through the assembled application chains.

use http::{HeaderMap, HeaderValue, StatusCode};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use portico_core::{
    AuthClaims, BusinessRuleContext, OperatorStatus, RouteDecision, RouteRequest, RouteResponse,
    UserOperatorStatus,
};
use portico_middleware::{
    AppProfile, BackendResult, BoxFuture, InMemoryBackend, RegistrationBackend, SessionClaims,
    SessionTokenResolver, StageContext, StaticTokenResolver, TokenResolver,
};
use proptest::prelude::*;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const USER: &str = "b1e7c2a4-guid";

fn industry_admin() -> AuthClaims {
    AuthClaims::parse("bceidbusiness", "industry_user_admin", USER).unwrap()
}

fn industry_user() -> AuthClaims {
    AuthClaims::parse("bceidbusiness", "industry_user", USER).unwrap()
}

fn facts(user: UserOperatorStatus, operator: OperatorStatus) -> BusinessRuleContext {
    BusinessRuleContext::new(user, "4242", operator, "Bravo Gas Ltd.")
}

async fn route(
    profile: AppProfile,
    resolver: impl TokenResolver,
    backend: Arc<dyn RegistrationBackend>,
    request: RouteRequest,
) -> (RouteResponse, StageContext) {
    let chain = profile.build_chain(Arc::new(resolver), backend);
    let mut ctx = StageContext::new();
    let response = chain.process(&mut ctx, &request).await;
    (response, ctx)
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

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

#[tokio::test]
async fn allow_listed_profile_passes_through_for_industry_admin() {
    let (response, ctx) = route(
        AppProfile::administration(),
        StaticTokenResolver::authenticated(industry_admin()),
        Arc::new(InMemoryBackend::new()),
        RouteRequest::new("/administration/profile"),
    )
    .await;

    assert_eq!(response.decision(), &RouteDecision::PassThrough);
    assert!(ctx.is_authenticated());
}

#[tokio::test]
async fn missing_session_redirects_to_onboarding_with_307() {
    let backend = Arc::new(InMemoryBackend::new());
    let (response, ctx) = route(
        AppProfile::administration(),
        StaticTokenResolver::anonymous(),
        backend.clone(),
        RouteRequest::new("/administration/operations"),
    )
    .await;

    match response.decision() {
        RouteDecision::Redirect { location, status } => {
            assert_eq!(location, "/onboarding");
            assert_eq!(*status, StatusCode::TEMPORARY_REDIRECT);
        }
        other => panic!("expected redirect, got {other:?}"),
    }
    assert_eq!(ctx.visited(), &["authorization"]);
    assert_eq!(backend.fetch_count(), 0);
}

#[tokio::test]
async fn unauthenticated_allow_listed_request_never_reaches_rules() {
    let backend = Arc::new(InMemoryBackend::new());
    let (response, ctx) = route(
        AppProfile::registration(),
        StaticTokenResolver::anonymous(),
        backend.clone(),
        RouteRequest::new("/registration/profile"),
    )
    .await;

    assert_eq!(response.decision(), &RouteDecision::PassThrough);
    assert!(!ctx.is_authenticated());
    assert_eq!(backend.fetch_count(), 0);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert_eq!(
        response.headers()["x-request-id"],
        ctx.request_id().to_string().as_str()
    );
}

#[tokio::test]
async fn onboarding_is_never_redirected_to_itself() {
    for profile in [
        AppProfile::administration(),
        AppProfile::registration(),
        AppProfile::dashboard(),
    ] {
        for path in ["/onboarding", "/onboarding/terms"] {
            let backend = Arc::new(InMemoryBackend::new());
            let (response, _) = route(
                profile.clone(),
                StaticTokenResolver::anonymous(),
                backend.clone(),
                RouteRequest::new(path),
            )
            .await;

            assert_eq!(response.decision(), &RouteDecision::PassThrough, "{path}");
            assert_eq!(backend.fetch_count(), 0);
        }
    }

    let (response, _) = route(
        AppProfile::registration(),
        StaticTokenResolver::authenticated(
            AuthClaims::parse("idir", "cas_admin", "staff-guid").unwrap(),
        ),
        Arc::new(InMemoryBackend::new()),
        RouteRequest::new("/onboarding"),
    )
    .await;
    assert_eq!(response.decision(), &RouteDecision::PassThrough);
}

#[tokio::test]
async fn framework_assets_are_not_intercepted() {
    for path in ["/_next/static/chunks/main.js", "/favicon.ico"] {
        let (response, ctx) = route(
            AppProfile::registration(),
            StaticTokenResolver::anonymous(),
            Arc::new(InMemoryBackend::new()),
            RouteRequest::new(path),
        )
        .await;

        assert_eq!(response.decision(), &RouteDecision::PassThrough, "{path}");
        assert_eq!(ctx.visited(), &["authorization"]);
    }
}

#[tokio::test]
async fn draft_operator_is_redirected_from_operations() {
    for claims in [industry_admin(), industry_user()] {
        let backend = Arc::new(
            InMemoryBackend::new()
                .with_current(USER, facts(UserOperatorStatus::Approved, OperatorStatus::Draft)),
        );
        let (response, _) = route(
            AppProfile::administration(),
            StaticTokenResolver::authenticated(claims),
            backend,
            RouteRequest::new("/administration/operations"),
        )
        .await;

        assert_eq!(response.decision(), &RouteDecision::redirect("/administration"));
    }
}

#[tokio::test]
async fn approved_operator_reaches_rewritten_operations() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_current(USER, facts(UserOperatorStatus::Approved, OperatorStatus::Approved)),
    );
    let (response, ctx) = route(
        AppProfile::administration(),
        StaticTokenResolver::authenticated(industry_admin()),
        backend,
        RouteRequest::new("/administration/operations/17"),
    )
    .await;

    assert_eq!(
        response.decision(),
        &RouteDecision::Rewrite(
            "/administration/bceidbusiness/industry_user_admin/operations/17".to_string()
        )
    );
    assert_eq!(ctx.visited(), &["authorization", "business_rules", "response"]);
    assert_eq!(response.headers()["cache-control"], "no-store");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn approved_member_leaves_select_operator() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_current(USER, facts(UserOperatorStatus::Approved, OperatorStatus::Approved)),
    );
    let (response, _) = route(
        AppProfile::registration(),
        StaticTokenResolver::authenticated(industry_user()),
        backend,
        RouteRequest::new("/registration/select-operator"),
    )
    .await;

    assert_eq!(
        response.decision(),
        &RouteDecision::redirect("/registration/my-operator")
    );
}

#[tokio::test]
async fn pending_request_goes_to_request_access() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_pending(USER, facts(UserOperatorStatus::Pending, OperatorStatus::Approved)),
    );
    let (response, _) = route(
        AppProfile::registration(),
        StaticTokenResolver::authenticated(industry_user()),
        backend.clone(),
        RouteRequest::new("/registration/select-operator/confirm/4242"),
    )
    .await;

    assert_eq!(
        response.decision(),
        &RouteDecision::redirect(
            "/registration/select-operator/received/request-access/4242?title=Bravo+Gas+Ltd."
        )
    );
    assert_eq!(backend.fetch_count(), 2);
}

#[tokio::test]
async fn confirmation_pages_are_not_redirected() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_current(USER, facts(UserOperatorStatus::Pending, OperatorStatus::Draft)),
    );
    let (response, _) = route(
        AppProfile::registration(),
        StaticTokenResolver::authenticated(industry_user()),
        backend.clone(),
        RouteRequest::new("/registration/select-operator/received/request-access/4242"),
    )
    .await;

    assert!(matches!(response.decision(), RouteDecision::Rewrite(_)));
    assert_eq!(backend.fetch_count(), 0);
}

#[tokio::test]
async fn backend_failure_is_a_terminal_redirect() {
    let (response, _) = route(
        AppProfile::administration(),
        StaticTokenResolver::authenticated(industry_admin()),
        Arc::new(InMemoryBackend::new().failing(502)),
        RouteRequest::new("/administration/operations"),
    )
    .await;

    assert_eq!(response.decision(), &RouteDecision::redirect("/administration"));
}

#[tokio::test(start_paused = true)]
async fn hanging_backend_times_out_into_redirect() {
    let (response, _) = route(
        AppProfile::registration().with_rule_timeout(Duration::from_millis(200)),
        StaticTokenResolver::authenticated(industry_user()),
        Arc::new(Hanging),
        RouteRequest::new("/registration/select-operator"),
    )
    .await;

    assert_eq!(response.decision(), &RouteDecision::redirect("/registration"));
}

#[tokio::test]
async fn facts_are_fetched_for_every_request() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_current(USER, facts(UserOperatorStatus::Approved, OperatorStatus::Pending)),
    );
    let chain = AppProfile::administration().build_chain(
        Arc::new(StaticTokenResolver::authenticated(industry_admin())),
        backend.clone(),
    );

    for _ in 0..3 {
        let mut ctx = StageContext::new();
        chain
            .process(&mut ctx, &RouteRequest::new("/administration/operations"))
            .await;
    }

    assert_eq!(backend.fetch_count(), 3);
}

#[tokio::test]
async fn staff_are_rewritten_without_rules() {
    let backend = Arc::new(InMemoryBackend::new());
    let staff = AuthClaims::parse("idir", "cas_director", "staff-1").unwrap();
    let (response, _) = route(
        AppProfile::administration(),
        StaticTokenResolver::authenticated(staff),
        backend.clone(),
        RouteRequest::new("/administration/operations"),
    )
    .await;

    assert_eq!(
        response.decision(),
        &RouteDecision::Rewrite("/administration/idir/cas_director/operations".to_string())
    );
    assert_eq!(backend.fetch_count(), 0);
}

#[tokio::test]
async fn signed_session_cookie_end_to_end() {
    let secret = b"integration-secret";
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 300;
    let token = encode(
        &Header::new(Algorithm::HS256),
        &SessionClaims {
            identity_provider: "bceidbusiness".to_string(),
            app_role: "industry_user".to_string(),
            user_guid: USER.to_string(),
            exp,
        },
        &EncodingKey::from_secret(secret),
    )
    .unwrap();

    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        HeaderValue::from_str(&format!("__Secure-next-auth.session-token={token}")).unwrap(),
    );
    let uri: http::Uri = "/dashboard/reports?year=2024".parse().unwrap();

    let (response, _) = route(
        AppProfile::dashboard(),
        SessionTokenResolver::new(secret),
        Arc::new(InMemoryBackend::new()),
        RouteRequest::from_parts(&uri, headers),
    )
    .await;

    assert_eq!(
        response.decision(),
        &RouteDecision::Rewrite("/dashboard/bceidbusiness/industry_user/reports".to_string())
    );
}

#[tokio::test]
async fn tampered_cookie_is_treated_as_absent() {
    let mut headers = HeaderMap::new();
    headers.insert(
        "cookie",
        HeaderValue::from_static("next-auth.session-token=not.a.jwt"),
    );

    let (response, _) = route(
        AppProfile::dashboard(),
        SessionTokenResolver::new(b"secret"),
        Arc::new(InMemoryBackend::new()),
        RouteRequest::new("/dashboard").with_headers(headers),
    )
    .await;

    assert_eq!(response.decision(), &RouteDecision::redirect("/onboarding"));
}

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,9}"
}

fn app_path(base: &'static str) -> impl Strategy<Value = String> {
    proptest::collection::vec(segment(), 0..5)
        .prop_map(move |segments| format!("{base}/{}", segments.join("/")))
}

proptest! {
    #[test]
    fn unauthenticated_requests_go_to_onboarding(path in app_path("/administration")) {
        let request = RouteRequest::new(path);
        prop_assume!(request.final_segment() != Some("profile"));

        let (response, _) = block_on(route(
            AppProfile::administration(),
            StaticTokenResolver::anonymous(),
            Arc::new(InMemoryBackend::new()),
            request,
        ));
        prop_assert_eq!(response.decision(), &RouteDecision::redirect("/onboarding"));
    }

    #[test]
    fn rewrite_is_prefixed_and_idempotent(path in app_path("/dashboard")) {
        let request = RouteRequest::new(path);
        prop_assume!(request.final_segment() != Some("profile"));
        let claims = industry_admin();
        let prefix = format!("/dashboard/{}", claims.namespace());

        let (first, _) = block_on(route(
            AppProfile::dashboard(),
            StaticTokenResolver::authenticated(claims.clone()),
            Arc::new(InMemoryBackend::new()),
            request,
        ));
        let rewritten = match first.decision() {
            RouteDecision::Rewrite(path) => path.clone(),
            other => return Err(TestCaseError::fail(format!("expected rewrite, got {other:?}"))),
        };
        prop_assert!(rewritten.starts_with(&prefix));

        let (second, _) = block_on(route(
            AppProfile::dashboard(),
            StaticTokenResolver::authenticated(claims),
            Arc::new(InMemoryBackend::new()),
            RouteRequest::new(rewritten.clone()),
        ));
        prop_assert_eq!(second.decision(), &RouteDecision::Rewrite(rewritten));
    }
}

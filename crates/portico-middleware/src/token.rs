//! Session token resolution.
//!
//! A [`TokenResolver`] turns the inbound session credential into
//! [`AuthClaims`]. Every failure (no cookie, expired token, bad signature,
//! claims outside the role table) is reported as a [`SessionError`], and
//! the authorization stage treats all of them as "unauthenticated".

use crate::stage::BoxFuture;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use portico_core::{AuthClaims, ClaimsError, RouteRequest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default session cookie names, checked in order.
pub const DEFAULT_COOKIE_NAMES: [&str; 2] =
    ["__Secure-next-auth.session-token", "next-auth.session-token"];

/// Why a request carries no usable session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No session cookie or bearer token.
    #[error("no session credential")]
    Absent,

    /// The token's `exp` has passed.
    #[error("session expired")]
    Expired,

    /// The token could not be decoded or verified.
    #[error("malformed session token: {0}")]
    Malformed(String),

    /// The claims are not a valid (provider, role, user) triple.
    #[error(transparent)]
    InvalidClaims(#[from] ClaimsError),
}

impl SessionError {
    /// Short label for logs.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Expired => "expired",
            Self::Malformed(_) => "malformed",
            Self::InvalidClaims(_) => "invalid_claims",
        }
    }
}

/// Extracts claims from an inbound request.
pub trait TokenResolver: Send + Sync + 'static {
    /// Resolves the caller's claims.
    fn resolve<'a>(&'a self, request: &'a RouteRequest) -> BoxFuture<'a, Result<AuthClaims, SessionError>>;
}

/// Payload of a signed session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Identity provider name, e.g. `bceidbusiness`.
    pub identity_provider: String,
    /// Application role, e.g. `industry_user_admin`.
    pub app_role: String,
    /// The provider's user GUID.
    pub user_guid: String,
    /// Expiry as seconds since the epoch.
    pub exp: u64,
}

/// Resolves HS256-signed session tokens from cookies or a bearer header.
#[derive(Clone)]
pub struct SessionTokenResolver {
    key: DecodingKey,
    validation: Validation,
    cookie_names: Vec<String>,
    allow_bearer: bool,
}

impl SessionTokenResolver {
    /// Creates a resolver for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
            cookie_names: DEFAULT_COOKIE_NAMES.iter().map(|s| (*s).to_string()).collect(),
            allow_bearer: true,
        }
    }

    /// Replaces the cookie names checked, in order.
    #[must_use]
    pub fn with_cookie_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cookie_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Enables or disables the `Authorization: Bearer` fallback.
    #[must_use]
    pub fn with_bearer(mut self, allow: bool) -> Self {
        self.allow_bearer = allow;
        self
    }

    /// Finds the raw token on the request.
    #[must_use]
    pub fn extract_token<'r>(&self, request: &'r RouteRequest) -> Option<&'r str> {
        let from_cookie = self
            .cookie_names
            .iter()
            .find_map(|name| find_cookie(request, name));
        if from_cookie.is_some() {
            return from_cookie;
        }

        if !self.allow_bearer {
            return None;
        }

        request
            .headers()
            .get(http::header::AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Verifies a token and maps it through the role table.
    pub fn decode(&self, token: &str) -> Result<AuthClaims, SessionError> {
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                _ => SessionError::Malformed(e.to_string()),
            })?;

        let claims = data.claims;
        Ok(AuthClaims::parse(
            &claims.identity_provider,
            &claims.app_role,
            &claims.user_guid,
        )?)
    }
}

impl std::fmt::Debug for SessionTokenResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokenResolver")
            .field("cookie_names", &self.cookie_names)
            .field("allow_bearer", &self.allow_bearer)
            .finish_non_exhaustive()
    }
}

impl TokenResolver for SessionTokenResolver {
    fn resolve<'a>(&'a self, request: &'a RouteRequest) -> BoxFuture<'a, Result<AuthClaims, SessionError>> {
        let result = self
            .extract_token(request)
            .ok_or(SessionError::Absent)
            .and_then(|token| self.decode(token));
        Box::pin(async move { result })
    }
}

fn find_cookie<'r>(request: &'r RouteRequest, name: &str) -> Option<&'r str> {
    request
        .headers()
        .get_all(http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}

/// A resolver with a fixed answer, for tests and local development.
#[derive(Debug, Clone)]
pub struct StaticTokenResolver {
    claims: Option<AuthClaims>,
}

impl StaticTokenResolver {
    /// Every request is authenticated with `claims`.
    #[must_use]
    pub fn authenticated(claims: AuthClaims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    /// Every request is unauthenticated.
    #[must_use]
    pub fn anonymous() -> Self {
        Self { claims: None }
    }
}

impl TokenResolver for StaticTokenResolver {
    fn resolve<'a>(&'a self, _request: &'a RouteRequest) -> BoxFuture<'a, Result<AuthClaims, SessionError>> {
        let result = self.claims.clone().ok_or(SessionError::Absent);
        Box::pin(async move { result })
    }
}

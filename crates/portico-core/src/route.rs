//! Requests entering the routing layer and the decisions leaving it.

use http::{HeaderMap, StatusCode};
use std::collections::BTreeMap;
use std::fmt;

/// Header carrying the request ID on responses and upstream requests.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The read-only view of an inbound request that stages evaluate.
///
/// Stages never mutate the request. The only change a stage may make is to
/// record a rewrite in the per-request context or to return a redirect.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    path: String,
    query_params: BTreeMap<String, String>,
    headers: HeaderMap,
}

impl RouteRequest {
    /// Creates a request for the given path with no query or headers.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: normalize_path(&path.into()),
            query_params: BTreeMap::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Builds a request from an HTTP URI and its headers.
    #[must_use]
    pub fn from_parts(uri: &http::Uri, headers: HeaderMap) -> Self {
        let query_params = uri
            .query()
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .into_owned()
                    .collect::<BTreeMap<_, _>>()
            })
            .unwrap_or_default();

        Self {
            path: normalize_path(uri.path()),
            query_params,
            headers,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Replaces the request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the request path, always starting with `/`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the decoded query parameters.
    #[must_use]
    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query_params
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the last non-empty path segment, if any.
    #[must_use]
    pub fn final_segment(&self) -> Option<&str> {
        self.path.rsplit('/').find(|s| !s.is_empty())
    }
}

/// The single terminal outcome of the stage chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Serve the requested path unchanged.
    PassThrough,
    /// Serve a different internal path; the browser URL is unchanged.
    Rewrite(String),
    /// Instruct the browser to request another URL.
    Redirect {
        /// Target URL (path plus optional query).
        location: String,
        /// Redirect status code.
        status: StatusCode,
    },
}

impl RouteDecision {
    /// A `307 Temporary Redirect` to `location`.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            status: StatusCode::TEMPORARY_REDIRECT,
        }
    }

    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Rewrite(_) => "rewrite",
            Self::Redirect { .. } => "redirect",
        }
    }

    /// True for redirects.
    #[must_use]
    pub const fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    /// The path the page layer should serve, given the original request path.
    ///
    /// Returns `None` for redirects.
    #[must_use]
    pub fn effective_path<'a>(&'a self, original: &'a str) -> Option<&'a str> {
        match self {
            Self::PassThrough => Some(original),
            Self::Rewrite(path) => Some(path),
            Self::Redirect { .. } => None,
        }
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassThrough => f.write_str("pass-through"),
            Self::Rewrite(path) => write!(f, "rewrite -> {path}"),
            Self::Redirect { location, status } => {
                write!(f, "redirect {} -> {location}", status.as_u16())
            }
        }
    }
}

/// What the chain hands back to the hosting server.
///
/// Carries exactly one [`RouteDecision`] plus any headers stages attached.
#[derive(Debug, Clone)]
pub struct RouteResponse {
    decision: RouteDecision,
    headers: HeaderMap,
}

impl RouteResponse {
    /// Wraps a decision with no extra headers.
    #[must_use]
    pub fn new(decision: RouteDecision) -> Self {
        Self {
            decision,
            headers: HeaderMap::new(),
        }
    }

    /// A pass-through response.
    #[must_use]
    pub fn pass_through() -> Self {
        Self::new(RouteDecision::PassThrough)
    }

    /// A rewrite response.
    #[must_use]
    pub fn rewrite(path: impl Into<String>) -> Self {
        Self::new(RouteDecision::Rewrite(path.into()))
    }

    /// A 307 redirect response.
    #[must_use]
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(RouteDecision::redirect(location))
    }

    /// Returns the decision.
    #[must_use]
    pub fn decision(&self) -> &RouteDecision {
        &self.decision
    }

    /// Returns the attached headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the attached headers mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Splits into decision and headers.
    #[must_use]
    pub fn into_parts(self) -> (RouteDecision, HeaderMap) {
        (self.decision, self.headers)
    }
}

/// Joins a base path and a relative path, collapsing duplicate slashes.
///
/// ```
/// use portico_core::join_path;
///
/// assert_eq!(join_path("/administration", "/operations"), "/administration/operations");
/// assert_eq!(join_path("/administration", ""), "/administration");
/// assert_eq!(join_path("", ""), "/");
/// ```
#[must_use]
pub fn join_path(base: &str, rest: &str) -> String {
    let base = base.trim_end_matches('/');
    let rest = rest.trim_start_matches('/');
    match (base.is_empty(), rest.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{rest}"),
        (false, true) => normalize_path(base),
        (false, false) => normalize_path(&format!("{base}/{rest}")),
    }
}

fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_parses_query() {
        let uri: http::Uri = "/administration/operations?page=2&title=A%20B".parse().unwrap();
        let req = RouteRequest::from_parts(&uri, HeaderMap::new());
        assert_eq!(req.path(), "/administration/operations");
        assert_eq!(req.query_params().get("page").map(String::as_str), Some("2"));
        assert_eq!(req.query_params().get("title").map(String::as_str), Some("A B"));
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(RouteRequest::new("").path(), "/");
        assert_eq!(RouteRequest::new("//administration//profile/").path(), "/administration/profile");
    }

    #[test]
    fn test_final_segment() {
        assert_eq!(RouteRequest::new("/administration/profile").final_segment(), Some("profile"));
        assert_eq!(RouteRequest::new("/").final_segment(), None);
    }

    #[test]
    fn test_redirect_defaults_to_307() {
        match RouteDecision::redirect("/onboarding") {
            RouteDecision::Redirect { location, status } => {
                assert_eq!(location, "/onboarding");
                assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
            }
            other => panic!("unexpected decision {other:?}"),
        }
    }

    #[test]
    fn test_effective_path() {
        assert_eq!(RouteDecision::PassThrough.effective_path("/a"), Some("/a"));
        assert_eq!(RouteDecision::Rewrite("/b".into()).effective_path("/a"), Some("/b"));
        assert_eq!(RouteDecision::redirect("/c").effective_path("/a"), None);
    }

    #[test]
    fn test_decision_kind() {
        assert_eq!(RouteDecision::PassThrough.kind(), "pass_through");
        assert_eq!(RouteDecision::Rewrite("/x".into()).kind(), "rewrite");
        assert!(RouteDecision::redirect("/x").is_redirect());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("/registration/", "/my-operator"), "/registration/my-operator");
        assert_eq!(join_path("", "/onboarding"), "/onboarding");
    }
}

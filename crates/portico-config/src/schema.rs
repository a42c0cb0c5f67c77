//! Configuration schema types.
//!
//! This module defines the structure of all configuration sections.

use portico_telemetry::LogFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Gateway server section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Base URL of the page renderer that receives forwarded requests.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            upstream_url: default_upstream_url(),
            upstream_timeout_ms: default_upstream_timeout(),
        }
    }
}

impl GatewayConfig {
    /// Upstream timeout as a [`Duration`].
    #[must_use]
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_upstream_timeout() -> u64 {
    30_000
}

/// Registration backend section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL of the backend API. Also read from `API_URL`.
    #[serde(default)]
    pub api_url: String,

    /// HTTP client timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Upper bound on a whole business-rule evaluation in milliseconds.
    #[serde(default = "default_rule_timeout")]
    pub rule_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            request_timeout_ms: default_request_timeout(),
            rule_timeout_ms: default_rule_timeout(),
        }
    }
}

impl BackendConfig {
    /// HTTP client timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Business-rule timeout as a [`Duration`].
    #[must_use]
    pub fn rule_timeout(&self) -> Duration {
        Duration::from_millis(self.rule_timeout_ms)
    }
}

fn default_request_timeout() -> u64 {
    5_000
}

fn default_rule_timeout() -> u64 {
    8_000
}

/// Session credential section.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// HS256 signing secret. Also read from `NEXTAUTH_SECRET`.
    #[serde(default)]
    pub secret: String,

    /// Cookie names checked in order.
    #[serde(default = "default_cookie_names")]
    pub cookie_names: Vec<String>,

    /// Accept `Authorization: Bearer` when no cookie is present.
    #[serde(default = "default_true")]
    pub allow_bearer: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            cookie_names: default_cookie_names(),
            allow_bearer: true,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("cookie_names", &self.cookie_names)
            .field("allow_bearer", &self.allow_bearer)
            .finish()
    }
}

fn default_cookie_names() -> Vec<String> {
    vec![
        "__Secure-next-auth.session-token".to_string(),
        "next-auth.session-token".to_string(),
    ]
}

/// The hosting application a gateway instance fronts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    /// Staff and industry administration.
    #[default]
    Administration,
    /// Operator registration.
    Registration,
    /// Landing dashboard.
    Dashboard,
}

impl AppKind {
    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Administration => "administration",
            Self::Registration => "registration",
            Self::Dashboard => "dashboard",
        }
    }

    /// Returns the default base path the application is mounted at.
    #[must_use]
    pub const fn default_base_path(self) -> &'static str {
        match self {
            Self::Administration => "/administration",
            Self::Registration => "/registration",
            Self::Dashboard => "/dashboard",
        }
    }
}

impl fmt::Display for AppKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "administration" => Ok(Self::Administration),
            "registration" => Ok(Self::Registration),
            "dashboard" => Ok(Self::Dashboard),
            other => Err(format!(
                "unknown application '{other}', expected 'administration', 'registration', or 'dashboard'"
            )),
        }
    }
}

/// Application section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Which application profile to run.
    #[serde(default)]
    pub profile: AppKind,

    /// Overrides the profile's base path.
    #[serde(default)]
    pub base_path: Option<String>,

    /// Where unauthenticated callers are sent.
    #[serde(default = "default_onboarding_path")]
    pub onboarding_path: String,

    /// Path prefixes that bypass interception (framework assets, favicon).
    #[serde(default = "default_exempt_prefixes")]
    pub exempt_prefixes: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: AppKind::default(),
            base_path: None,
            onboarding_path: default_onboarding_path(),
            exempt_prefixes: default_exempt_prefixes(),
        }
    }
}

impl AppConfig {
    /// The effective base path.
    #[must_use]
    pub fn base_path(&self) -> &str {
        self.base_path
            .as_deref()
            .unwrap_or_else(|| self.profile.default_base_path())
    }
}

fn default_onboarding_path() -> String {
    "/onboarding".to_string()
}

fn default_exempt_prefixes() -> Vec<String> {
    vec!["/_next/".to_string(), "/favicon.ico".to_string()]
}

/// Telemetry section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySection {
    /// Service name reported in logs and the version endpoint.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Log filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output style.
    #[serde(default)]
    pub log_format: LogFormat,

    /// Install the Prometheus recorder.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            metrics_enabled: true,
        }
    }
}

fn default_service_name() -> String {
    "portico-gateway".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

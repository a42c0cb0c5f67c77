//! Main configuration types.
//!
//! This module provides the top-level [`PorticoConfig`] struct and its builder.

use portico_telemetry::{LogConfig, LogFormat, MetricsConfig};
use serde::{Deserialize, Serialize};

use crate::{AppConfig, BackendConfig, ConfigError, GatewayConfig, SessionConfig, TelemetrySection};

/// Complete gateway configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from files
/// and environment variables.
///
/// # Example
///
/// ```
/// use portico_config::PorticoConfig;
///
/// let config = PorticoConfig::default();
/// assert_eq!(config.gateway.listen_addr, "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct PorticoConfig {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Registration backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Session credential settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Hosting application settings.
    #[serde(default)]
    pub app: AppConfig,

    /// Logging and metrics settings.
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl PorticoConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> PorticoConfigBuilder {
        PorticoConfigBuilder::new()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// - `MissingField("API_URL")` when the backend URL is blank
    /// - `MissingField("NEXTAUTH_SECRET")` when the session secret is blank
    /// - `InvalidValue` for malformed addresses, non-http URLs, zero timeouts
    ///   or a relative onboarding path
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.api_url.trim().is_empty() {
            return Err(ConfigError::missing_field("API_URL"));
        }
        validate_http_url("backend.api_url", &self.backend.api_url)?;

        if self.session.secret.is_empty() {
            return Err(ConfigError::missing_field("NEXTAUTH_SECRET"));
        }

        if self.gateway.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "gateway.listen_addr",
                format!("invalid socket address: {}", self.gateway.listen_addr),
            ));
        }
        validate_http_url("gateway.upstream_url", &self.gateway.upstream_url)?;

        for (field, value) in [
            ("gateway.upstream_timeout_ms", self.gateway.upstream_timeout_ms),
            ("backend.request_timeout_ms", self.backend.request_timeout_ms),
            ("backend.rule_timeout_ms", self.backend.rule_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid_value(field, "must be greater than zero"));
            }
        }

        if !self.app.onboarding_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "app.onboarding_path",
                "must be an absolute path",
            ));
        }
        if let Some(prefix) = self.app.exempt_prefixes.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::invalid_value(
                "app.exempt_prefixes",
                format!("'{prefix}' must be an absolute path prefix"),
            ));
        }
        if !self.app.base_path().starts_with('/') {
            return Err(ConfigError::invalid_value(
                "app.base_path",
                "must be an absolute path",
            ));
        }

        if self.session.cookie_names.is_empty() && !self.session.allow_bearer {
            return Err(ConfigError::validation_error(
                "session.cookie_names is empty and bearer tokens are disabled",
            ));
        }

        Ok(())
    }

    /// Pretty debug logging.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.telemetry.log_level = "debug".to_string();
        config.telemetry.log_format = LogFormat::Pretty;
        config
    }

    /// JSON info logging.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.telemetry.log_level = "info".to_string();
        config.telemetry.log_format = LogFormat::Json;
        config
    }

    /// Logging settings derived from the telemetry section.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let base = match self.telemetry.log_format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        base.with_level(self.telemetry.log_level.clone())
    }

    /// Metrics settings derived from the telemetry section.
    #[must_use]
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.telemetry.metrics_enabled,
            ..MetricsConfig::default()
        }
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(value)
        .map_err(|e| ConfigError::invalid_value(field, format!("invalid URL '{value}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::invalid_value(
            field,
            format!("unsupported scheme '{other}', expected http or https"),
        )),
    }
}

/// Builder for [`PorticoConfig`].
#[derive(Debug, Default)]
pub struct PorticoConfigBuilder {
    config: PorticoConfig,
}

impl PorticoConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gateway section.
    #[must_use]
    pub fn gateway(mut self, gateway: GatewayConfig) -> Self {
        self.config.gateway = gateway;
        self
    }

    /// Set the backend section.
    #[must_use]
    pub fn backend(mut self, backend: BackendConfig) -> Self {
        self.config.backend = backend;
        self
    }

    /// Set the session section.
    #[must_use]
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    /// Set the application section.
    #[must_use]
    pub fn app(mut self, app: AppConfig) -> Self {
        self.config.app = app;
        self
    }

    /// Set the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetrySection) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Shorthand for the backend URL.
    #[must_use]
    pub fn api_url(mut self, api_url: impl Into<String>) -> Self {
        self.config.backend.api_url = api_url.into();
        self
    }

    /// Shorthand for the session secret.
    #[must_use]
    pub fn session_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.session.secret = secret.into();
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PorticoConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppKind;

    fn valid() -> PorticoConfig {
        PorticoConfig::builder()
            .api_url("http://backend:8000/api")
            .session_secret("secret")
            .build()
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_missing_api_url_is_fatal() {
        let config = PorticoConfig::builder().session_secret("secret").build();
        let err = config.validate().unwrap_err();
        assert_eq!(err.missing_field_name(), Some("API_URL"));

        let mut config = valid();
        config.backend.api_url = "   ".to_string();
        assert_eq!(config.validate().unwrap_err().missing_field_name(), Some("API_URL"));
    }

    #[test]
    fn test_missing_secret_is_fatal() {
        let config = PorticoConfig::builder().api_url("http://backend").build();
        assert_eq!(
            config.validate().unwrap_err().missing_field_name(),
            Some("NEXTAUTH_SECRET")
        );
    }

    #[test]
    fn test_non_http_api_url() {
        let mut config = valid();
        config.backend.api_url = "ftp://backend".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = valid();
        config.backend.rule_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend.rule_timeout_ms"));
    }

    #[test]
    fn test_invalid_listen_addr() {
        let mut config = valid();
        config.gateway.listen_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_onboarding_rejected() {
        let mut config = valid();
        config.app.onboarding_path = "onboarding".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_exempt_prefix_rejected() {
        let mut config = valid();
        config.app.exempt_prefixes = vec!["/_next/".to_string(), "static/".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("app.exempt_prefixes"));
    }

    #[test]
    fn test_presets() {
        let dev = PorticoConfig::development();
        assert_eq!(dev.telemetry.log_format, LogFormat::Pretty);
        assert_eq!(dev.log_config().level, "debug");

        let prod = PorticoConfig::production();
        assert_eq!(prod.log_config().format, LogFormat::Json);
    }

    #[test]
    fn test_metrics_config_follows_section() {
        let mut config = valid();
        config.telemetry.metrics_enabled = false;
        assert!(!config.metrics_config().enabled);
    }

    #[test]
    fn test_builder_sections() {
        let config = PorticoConfig::builder()
            .app(AppConfig {
                profile: AppKind::Registration,
                ..AppConfig::default()
            })
            .build();
        assert_eq!(config.app.base_path(), "/registration");
    }
}

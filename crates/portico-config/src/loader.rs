//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, `.env` and environment variables.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::{AppKind, ConfigError, PorticoConfig};
use portico_telemetry::LogFormat;

/// Environment variable carrying the backend base URL.
pub const API_URL_VAR: &str = "API_URL";

/// Environment variable carrying the session signing secret.
pub const SESSION_SECRET_VAR: &str = "NEXTAUTH_SECRET";

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. `API_URL` and `NEXTAUTH_SECRET`
/// 4. Prefixed environment variables (`PREFIX__SECTION__KEY`)
///
/// # Example
///
/// ```no_run
/// use portico_config::ConfigLoader;
///
/// # fn main() -> Result<(), portico_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_defaults()
///     .with_optional_file("portico.toml")?
///     .with_dotenv()?
///     .with_env_prefix("PORTICO")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: PorticoConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PorticoConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Start with default configuration values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = PorticoConfig::default();
        self
    }

    /// Start with the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = PorticoConfig::development();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension (`.toml` or `.json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed or
    /// contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        self.file_loaded = true;

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `"toml"` or `"json"` format.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unknown.
    ///
    /// # Example
    ///
    /// ```
    /// use portico_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [backend]
    ///     api_url = "http://backend:8000/api"
    ///
    ///     [session]
    ///     secret = "s3cret"
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load_unvalidated();
    ///
    /// assert_eq!(config.backend.api_url, "http://backend:8000/api");
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// With prefix "PORTICO":
    /// - `PORTICO__GATEWAY__LISTEN_ADDR=0.0.0.0:9000`
    /// - `PORTICO__APP__PROFILE=registration`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => Ok(self),
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!(
                "failed to load .env file: {e}"
            ))),
        }
    }

    /// Whether a configuration file was loaded.
    #[must_use]
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on a malformed override or a validation failure,
    /// notably `MissingField("API_URL")`.
    pub fn load(self) -> Result<PorticoConfig, ConfigError> {
        let config = self.load_from_env(|key| env::var(key).ok(), env::vars())?;
        config.validate()?;
        Ok(config)
    }

    /// Return the configuration without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> PorticoConfig {
        self.config
    }

    fn load_from_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
        vars: impl Iterator<Item = (String, String)>,
    ) -> Result<PorticoConfig, ConfigError> {
        self.apply_conventional_vars(lookup);

        if let Some(prefix) = self.env_prefix.take() {
            let env_vars: HashMap<String, String> =
                vars.filter(|(k, _)| k.starts_with(&prefix)).collect();
            for (key, value) in env_vars {
                self.apply_env_var(&key, &value, &prefix)?;
            }
        }

        Ok(self.config)
    }

    // API_URL and NEXTAUTH_SECRET are honoured regardless of prefix.
    fn apply_conventional_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_url) = lookup(API_URL_VAR).filter(|v| !v.trim().is_empty()) {
            self.config.backend.api_url = api_url;
        }
        if let Some(secret) = lookup(SESSION_SECRET_VAR).filter(|v| !v.is_empty()) {
            self.config.session.secret = secret;
        }
    }

    fn parse_file(content: &str, path: &Path) -> Result<PorticoConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            ["GATEWAY", "LISTEN_ADDR"] => {
                self.config.gateway.listen_addr = value.to_string();
            }
            ["GATEWAY", "UPSTREAM_URL"] => {
                self.config.gateway.upstream_url = value.to_string();
            }
            ["GATEWAY", "UPSTREAM_TIMEOUT_MS"] => {
                self.config.gateway.upstream_timeout_ms = parse_u64(key, value)?;
            }

            ["BACKEND", "API_URL"] => {
                self.config.backend.api_url = value.to_string();
            }
            ["BACKEND", "REQUEST_TIMEOUT_MS"] => {
                self.config.backend.request_timeout_ms = parse_u64(key, value)?;
            }
            ["BACKEND", "RULE_TIMEOUT_MS"] => {
                self.config.backend.rule_timeout_ms = parse_u64(key, value)?;
            }

            ["SESSION", "SECRET"] => {
                self.config.session.secret = value.to_string();
            }
            ["SESSION", "COOKIE_NAMES"] => {
                self.config.session.cookie_names = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["SESSION", "ALLOW_BEARER"] => {
                self.config.session.allow_bearer = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            ["APP", "PROFILE"] => {
                self.config.app.profile = value
                    .parse::<AppKind>()
                    .map_err(|reason| ConfigError::env_parse_error(key, reason))?;
            }
            ["APP", "BASE_PATH"] => {
                self.config.app.base_path = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            ["APP", "ONBOARDING_PATH"] => {
                self.config.app.onboarding_path = value.to_string();
            }
            ["APP", "EXEMPT_PREFIXES"] => {
                self.config.app.exempt_prefixes = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }

            ["TELEMETRY", "SERVICE_NAME"] => {
                self.config.telemetry.service_name = value.to_string();
            }
            ["TELEMETRY", "LOG_LEVEL"] => {
                self.config.telemetry.log_level = value.to_string();
            }
            ["TELEMETRY", "LOG_FORMAT"] => {
                self.config.telemetry.log_format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "METRICS_ENABLED"] => {
                self.config.telemetry.metrics_enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            _ => {}
        }

        Ok(())
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

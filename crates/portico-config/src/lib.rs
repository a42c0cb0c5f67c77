//! Layered configuration for Portico.
//!
//! - TOML and JSON configuration files
//! - `.env` files via `dotenvy`
//! - `API_URL` and `NEXTAUTH_SECRET`, always honoured
//! - Prefixed environment overrides (`PORTICO__SECTION__KEY`)
//! - Strict parsing (unknown fields are errors) and fail-fast validation
//!
//! # Example
//!
//! ```no_run
//! use portico_config::ConfigLoader;
//!
//! # fn main() -> Result<(), portico_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_optional_file("portico.toml")?
//!     .with_env_prefix("PORTICO")
//!     .load()?;
//!
//! println!("fronting {} at {}", config.app.profile, config.app.base_path());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [gateway]
//! listen_addr = "0.0.0.0:8080"
//! upstream_url = "http://127.0.0.1:3000"
//! upstream_timeout_ms = 30000
//!
//! [backend]
//! api_url = "http://backend:8000/api"
//! request_timeout_ms = 5000
//! rule_timeout_ms = 8000
//!
//! [session]
//! cookie_names = ["__Secure-next-auth.session-token", "next-auth.session-token"]
//! allow_bearer = true
//!
//! [app]
//! profile = "administration"
//! onboarding_path = "/onboarding"
//! exempt_prefixes = ["/_next/", "/favicon.ico"]
//!
//! [telemetry]
//! service_name = "portico-gateway"
//! log_level = "info"
//! log_format = "json"
//! metrics_enabled = true
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::{PorticoConfig, PorticoConfigBuilder};
pub use error::ConfigError;
pub use loader::{ConfigLoader, API_URL_VAR, SESSION_SECRET_VAR};
pub use schema::{AppConfig, AppKind, BackendConfig, GatewayConfig, SessionConfig, TelemetrySection};

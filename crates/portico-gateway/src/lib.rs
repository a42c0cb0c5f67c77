//! # Portico Gateway
//!
//! The process that fronts one hosting application. Every browser request
//! is routed through the application's stage chain before anything reaches
//! the page server.
//!
//! ```text
//!  browser ──► portico-gateway ──► page server
//!                 │
//!                 ├─ Authorization  (session cookie / bearer token)
//!                 ├─ BusinessRules  (registration backend, API_URL)
//!                 └─ Response       (cache-control, x-request-id)
//! ```
//!
//! Redirects are answered by the gateway. Rewrites and pass-throughs are
//! forwarded with the browser's query string intact.
//!
//! # Example Usage
//!
//! ```bash
//! $ API_URL=http://backend:8000/api \
//!   NEXTAUTH_SECRET=... \
//!   PORTICO__APP__PROFILE=registration \
//!   portico-gateway --config /etc/portico/gateway.toml
//! ```

#![doc(html_root_url = "https://docs.rs/portico-gateway/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod health;
pub mod proxy;
pub mod server;

pub use error::{ErrorResponse, GatewayError, GatewayResult};
pub use health::{
    CheckOutcome, HealthChecker, HealthStatus, Liveness, Readiness, ReadinessCheck, ReadinessStatus,
};
pub use proxy::{ProxyClient, ProxyRequest, ProxyResponse, REWRITE_HEADER};
pub use server::{app_profile, GatewayServer, GatewayService, INTERNAL_PREFIX};

/// Gateway version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

//! Observability for Portico.
//!
//! - **Logging**: `tracing-subscriber` with JSON or pretty output
//! - **Metrics**: Prometheus exposition via the `metrics` facade
//!
//! # Example
//!
//! ```rust,ignore
//! use portico_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! init_telemetry(&LogConfig::production(), &MetricsConfig::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/portico-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initialises logging, then metrics.
///
/// # Errors
///
/// Returns the first subsystem error encountered.
pub fn init_telemetry(log: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(log)?;
    init_metrics(metrics)?;
    Ok(())
}

//! Prometheus metrics for Portico.
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `portico_route_decisions_total` | Counter | `app`, `decision` | Terminal routing decisions |
//! | `portico_fail_safe_redirects_total` | Counter | `app`, `reason` | Redirects issued because a rule could not be evaluated |
//! | `portico_backend_fetch_duration_seconds` | Histogram | `endpoint`, `outcome` | Registration backend latency |
//! | `portico_in_flight_requests` | Gauge | - | Requests currently in the chain |
//!
//! Recording functions are no-ops until [`init_metrics`] installs the
//! Prometheus recorder, so library code can call them unconditionally.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Buckets for backend fetch latency, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        }
    }
}

/// Installs the Prometheus recorder.
///
/// Exposition is rendered on demand with [`render_metrics`]; the gateway
/// serves it from its internal metrics endpoint.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if a recorder is already installed
/// or the bucket configuration is rejected.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&config.duration_buckets)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);

    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "portico_route_decisions_total",
        "Terminal routing decisions by application and kind"
    );
    describe_counter!(
        "portico_fail_safe_redirects_total",
        "Redirects issued because business rules could not be evaluated"
    );
    describe_histogram!(
        "portico_backend_fetch_duration_seconds",
        "Registration backend fetch duration in seconds"
    );
    describe_gauge!(
        "portico_in_flight_requests",
        "Requests currently being routed"
    );
}

/// Records the terminal decision for a request.
pub fn record_decision(app: &'static str, decision: &'static str) {
    counter!(
        "portico_route_decisions_total",
        "app" => app,
        "decision" => decision
    )
    .increment(1);
}

/// Records a fail-safe redirect.
///
/// `reason` is an error category label such as `backend_unavailable`.
pub fn record_fail_safe(app: &'static str, reason: &'static str) {
    counter!(
        "portico_fail_safe_redirects_total",
        "app" => app,
        "reason" => reason
    )
    .increment(1);
}

/// Records a backend fetch.
pub fn record_backend_fetch(endpoint: &'static str, success: bool, duration: Duration) {
    let outcome = if success { "ok" } else { "error" };
    histogram!(
        "portico_backend_fetch_duration_seconds",
        "endpoint" => endpoint,
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());
}

/// Guard that keeps the in-flight gauge accurate, even on early return.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Increments the in-flight gauge; the drop decrements it.
    #[must_use]
    pub fn new() -> Self {
        gauge!("portico_in_flight_requests").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("portico_in_flight_requests").decrement(1.0);
    }
}

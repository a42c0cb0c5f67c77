//! `/_portico/health` and `/_portico/ready`.
//!
//! Liveness only says the process is answering. Readiness combines the
//! listener flag with a live check of the page server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{GatewayError, GatewayResult};

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Liveness of the gateway process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Serving requests.
    Healthy,
}

/// Readiness of the gateway to take traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    /// Every check passed.
    Ready,
    /// At least one check failed.
    NotReady,
}

impl ReadinessStatus {
    /// True for [`ReadinessStatus::Ready`].
    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    fn from_checks(checks: &[ReadinessCheck]) -> Self {
        if checks.iter().all(ReadinessCheck::passed) {
            Self::Ready
        } else {
            Self::NotReady
        }
    }
}

/// Body of `/_portico/health`.
#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
    /// Always `healthy` while the process answers.
    pub status: HealthStatus,
    /// Application profile this gateway routes for.
    pub app: &'static str,
    /// Seconds since the checker was created.
    pub uptime_seconds: u64,
    /// Gateway version.
    pub version: &'static str,
}

/// Body of `/_portico/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    /// Overall verdict.
    pub status: ReadinessStatus,
    /// Listener check first, then the page server.
    pub checks: Vec<ReadinessCheck>,
}

/// What a single readiness check found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum CheckOutcome {
    /// The check passed.
    Pass {
        /// What was observed.
        detail: String,
    },
    /// The check failed.
    Fail {
        /// Why it failed.
        reason: String,
    },
}

/// One named readiness check.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessCheck {
    /// `listener` or `upstream`.
    pub name: &'static str,
    /// Result, flattened into the check object.
    #[serde(flatten)]
    pub outcome: CheckOutcome,
    /// Wall time of the check, when it did network I/O.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u128>,
}

impl ReadinessCheck {
    fn new(name: &'static str, outcome: CheckOutcome) -> Self {
        Self {
            name,
            outcome,
            elapsed_ms: None,
        }
    }

    fn timed(mut self, started: Instant) -> Self {
        self.elapsed_ms = Some(started.elapsed().as_millis());
        self
    }

    /// True when the check passed.
    pub fn passed(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Pass { .. })
    }
}

/// Last page-server check, kept for diagnostics.
#[derive(Debug, Clone, Copy)]
struct UpstreamSample {
    at: Instant,
    status: Option<u16>,
}

/// Tracks the listener flag and checks the page server.
#[derive(Debug)]
pub struct HealthChecker {
    app: &'static str,
    started: Instant,
    listening: AtomicBool,
    upstream_url: String,
    last_sample: RwLock<Option<UpstreamSample>>,
    client: reqwest::Client,
}

impl HealthChecker {
    /// A checker for `app` that checks `upstream_url`.
    pub fn new(app: &'static str, upstream_url: impl Into<String>) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(CHECK_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::server(format!("cannot build health client: {e}")))?;

        Ok(Self {
            app,
            started: Instant::now(),
            listening: AtomicBool::new(false),
            upstream_url: upstream_url.into(),
            last_sample: RwLock::new(None),
            client,
        })
    }

    /// Flips the listener flag. The server sets it once bound.
    pub fn set_ready(&self, listening: bool) {
        self.listening.store(listening, Ordering::Release);
    }

    /// True once the listener is bound.
    pub fn is_ready(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Time since the checker was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// When the page server was last checked.
    pub fn last_upstream_check(&self) -> Option<Instant> {
        let sample = *self.last_sample.read();
        sample.map(|sample| sample.at)
    }

    /// Status code of the last check, if the page server answered.
    pub fn last_upstream_status(&self) -> Option<u16> {
        let sample = *self.last_sample.read();
        sample.and_then(|sample| sample.status)
    }

    /// Liveness report.
    pub fn liveness(&self) -> Liveness {
        Liveness {
            status: HealthStatus::Healthy,
            app: self.app,
            uptime_seconds: self.uptime().as_secs(),
            version: crate::VERSION,
        }
    }

    /// Readiness report. Checks the page server on every call.
    pub async fn readiness(&self) -> Readiness {
        let listener = if self.is_ready() {
            ReadinessCheck::new(
                "listener",
                CheckOutcome::Pass {
                    detail: "accepting connections".to_string(),
                },
            )
        } else {
            ReadinessCheck::new(
                "listener",
                CheckOutcome::Fail {
                    reason: "not bound yet".to_string(),
                },
            )
        };
        let checks = vec![listener, self.check_upstream().await];

        Readiness {
            status: ReadinessStatus::from_checks(&checks),
            checks,
        }
    }

    /// Checks the page server root. A 5xx or no answer fails.
    pub async fn check_upstream(&self) -> ReadinessCheck {
        let started = Instant::now();
        let status = self
            .client
            .get(&self.upstream_url)
            .send()
            .await
            .map(|response| response.status());

        *self.last_sample.write() = Some(UpstreamSample {
            at: Instant::now(),
            status: status.as_ref().ok().map(reqwest::StatusCode::as_u16),
        });

        let outcome = match status {
            Ok(status) if status.is_server_error() => CheckOutcome::Fail {
                reason: format!("page server answered {status}"),
            },
            Ok(status) => CheckOutcome::Pass {
                detail: format!("page server answered {status}"),
            },
            Err(e) => CheckOutcome::Fail {
                reason: format!("page server unreachable: {e}"),
            },
        };
        ReadinessCheck::new("upstream", outcome).timed(started)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable_checker() -> HealthChecker {
        let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = closed.local_addr().unwrap();
        drop(closed);
        HealthChecker::new("administration", format!("http://{addr}")).unwrap()
    }

    #[test]
    fn test_check_serialization() {
        let check = ReadinessCheck::new(
            "upstream",
            CheckOutcome::Fail {
                reason: "refused".to_string(),
            },
        );
        assert!(!check.passed());

        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["name"], "upstream");
        assert_eq!(json["result"], "fail");
        assert_eq!(json["reason"], "refused");
        assert!(json.get("elapsed_ms").is_none());
    }

    #[test]
    fn test_liveness_reports_app() {
        let liveness = unreachable_checker().liveness();
        let json = serde_json::to_value(&liveness).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["app"], "administration");
        assert_eq!(json["version"], crate::VERSION);
    }

    #[test]
    fn test_listener_flag() {
        let checker = unreachable_checker();
        assert!(!checker.is_ready());
        checker.set_ready(true);
        assert!(checker.is_ready());
    }

    #[test]
    fn test_unreachable_page_server_is_not_ready() {
        let checker = unreachable_checker();
        checker.set_ready(true);

        let readiness = tokio_test::block_on(checker.readiness());
        assert_eq!(readiness.status, ReadinessStatus::NotReady);
        assert!(readiness.checks[0].passed());
        assert_eq!(readiness.checks[1].name, "upstream");
        assert!(!readiness.checks[1].passed());
        assert!(checker.last_upstream_check().is_some());
        assert_eq!(checker.last_upstream_status(), None);
    }

    #[tokio::test]
    async fn test_answering_page_server_passes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let checker = HealthChecker::new("dashboard", format!("http://{addr}")).unwrap();
        let check = checker.check_upstream().await;

        assert!(check.passed());
        assert!(check.elapsed_ms.is_some());
        assert_eq!(checker.last_upstream_status(), Some(404));
        server.await.unwrap();
    }
}

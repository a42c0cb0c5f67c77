//! Error types for the Portico gateway.

use std::fmt;

use portico_config::ConfigError;
use portico_middleware::BackendError;
use portico_telemetry::TelemetryError;
use thiserror::Error;

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// The page server could not be reached or answered unusably.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Error message.
        message: String,
        /// Optional HTTP status code from upstream.
        status: Option<u16>,
    },

    /// The inbound request could not be read.
    #[error("Bad request: {message}")]
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Server startup error.
    #[error("Server error: {message}")]
    Server {
        /// Error message.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    ConfigLoad(#[from] ConfigError),

    /// The registration backend client could not be built.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Logging or metrics could not be initialised.
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an upstream error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            status: None,
        }
    }

    /// Create a bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    /// Create a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// HTTP status code for this error.
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config { .. } | Self::ConfigLoad(_) => 500,
            Self::Upstream { status, .. } => status.unwrap_or(502),
            Self::BadRequest { .. } => 400,
            Self::Server { .. } => 500,
            Self::Backend(_) => 502,
            Self::Telemetry(_) => 500,
            Self::Io(_) => 500,
        }
    }

    /// True when a retry could succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Upstream { .. } | Self::Backend(_))
    }

    /// Error category for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } | Self::ConfigLoad(_) => "config",
            Self::Upstream { .. } => "upstream",
            Self::BadRequest { .. } => "bad_request",
            Self::Server { .. } => "server",
            Self::Backend(_) => "backend",
            Self::Telemetry(_) => "telemetry",
            Self::Io(_) => "io",
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// JSON error envelope returned to clients.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Error code/category.
    pub error: String,
    /// Human-readable message.
    pub message: String,
    /// Request ID for correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Set the request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

impl From<&GatewayError> for ErrorResponse {
    fn from(err: &GatewayError) -> Self {
        Self::new(err.category(), err.to_string())
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error, self.message)
    }
}

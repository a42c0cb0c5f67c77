//! Error types for Portico.
//!
//! The routing layer recognises three failure classes. Two are recovered
//! inside the chain and never surface to the browser as errors:
//!
//! | Category | Raised when | Recovery |
//! |---|---|---|
//! | `AuthAbsent` | No, expired or malformed session | Redirect to onboarding |
//! | `BackendUnavailable` | Business-rule fetch failed or timed out | Fail-safe redirect to the app root |
//! | `ConfigurationMissing` | Required setting (e.g. `API_URL`) unset | Process refuses to start |

use crate::claims::ClaimsError;
use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`PorticoError`].
pub type PorticoResult<T> = Result<T, PorticoError>;

/// Categories of errors for classification, logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No usable session.
    AuthAbsent,
    /// Session claims failed validation.
    InvalidClaims,
    /// The registration backend could not be reached or answered badly.
    BackendUnavailable,
    /// Required configuration is missing.
    ConfigurationMissing,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// Returns the metric / log label for this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AuthAbsent => "auth_absent",
            Self::InvalidClaims => "invalid_claims",
            Self::BackendUnavailable => "backend_unavailable",
            Self::ConfigurationMissing => "configuration_missing",
            Self::Internal => "internal",
        }
    }

    /// Returns the status used if the error ever has to be rendered directly.
    #[must_use]
    pub const fn default_status_code(&self) -> StatusCode {
        match self {
            Self::AuthAbsent | Self::InvalidClaims => StatusCode::UNAUTHORIZED,
            Self::BackendUnavailable => StatusCode::BAD_GATEWAY,
            Self::ConfigurationMissing | Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the chain recovers from this category with a redirect.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AuthAbsent | Self::InvalidClaims | Self::BackendUnavailable
        )
    }
}

/// Standard error type for Portico.
#[derive(Error, Debug)]
pub enum PorticoError {
    /// No usable session credential.
    #[error("authentication absent: {reason}")]
    AuthAbsent {
        /// Why the session was rejected.
        reason: String,
    },

    /// Session claims failed dispatch-table validation.
    #[error("invalid session claims: {0}")]
    InvalidClaims(#[from] ClaimsError),

    /// The backend fetch failed or timed out.
    #[error("backend unavailable: {message}")]
    BackendUnavailable {
        /// Human-readable error message.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing configuration: {key}")]
    ConfigurationMissing {
        /// The missing setting.
        key: String,
    },

    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl PorticoError {
    /// Creates an auth-absent error.
    #[must_use]
    pub fn auth_absent(reason: impl Into<String>) -> Self {
        Self::AuthAbsent {
            reason: reason.into(),
        }
    }

    /// Creates a backend-unavailable error.
    #[must_use]
    pub fn backend_unavailable(message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            message: message.into(),
        }
    }

    /// Creates a configuration-missing error.
    #[must_use]
    pub fn configuration_missing(key: impl Into<String>) -> Self {
        Self::ConfigurationMissing { key: key.into() }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthAbsent { .. } => ErrorCategory::AuthAbsent,
            Self::InvalidClaims(_) => ErrorCategory::InvalidClaims,
            Self::BackendUnavailable { .. } => ErrorCategory::BackendUnavailable,
            Self::ConfigurationMissing { .. } => ErrorCategory::ConfigurationMissing,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        self.category().default_status_code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            PorticoError::auth_absent("no cookie").category(),
            ErrorCategory::AuthAbsent
        );
        assert_eq!(
            PorticoError::backend_unavailable("timeout").category(),
            ErrorCategory::BackendUnavailable
        );
        assert_eq!(
            PorticoError::configuration_missing("API_URL").category(),
            ErrorCategory::ConfigurationMissing
        );
        assert_eq!(
            PorticoError::from(ClaimsError::EmptyUserId).category(),
            ErrorCategory::InvalidClaims
        );
    }

    #[test]
    fn test_recoverability() {
        assert!(ErrorCategory::AuthAbsent.is_recoverable());
        assert!(ErrorCategory::BackendUnavailable.is_recoverable());
        assert!(!ErrorCategory::ConfigurationMissing.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = PorticoError::configuration_missing("API_URL");
        assert_eq!(err.to_string(), "missing configuration: API_URL");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_category_serialization() {
        let json = serde_json::to_string(&ErrorCategory::BackendUnavailable).unwrap();
        assert_eq!(json, "\"backend_unavailable\"");
    }
}

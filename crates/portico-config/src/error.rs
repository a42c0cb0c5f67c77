//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Why a configuration could not be produced.
///
/// Every variant is fatal: the gateway refuses to start rather than serve
/// requests with a partial configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("config file {path} does not exist")]
    FileNotFound {
        /// Requested path.
        path: PathBuf,
    },

    /// The file exists but could not be read.
    #[error("cannot read config file {path}")]
    ReadError {
        /// Requested path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The TOML document is malformed or has unknown keys.
    #[error("bad TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The JSON document is malformed or has unknown keys.
    #[error("bad JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A value parsed but is not acceptable.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted key, e.g. `backend.api_url`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A value with no usable default was not supplied.
    #[error("missing required configuration field: {field}")]
    MissingField {
        /// Key or environment variable name.
        field: String,
    },

    /// An environment override could not be parsed.
    #[error("environment variable {var}: {reason}")]
    EnvParseError {
        /// Variable name.
        var: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Sections are individually valid but inconsistent together.
    #[error("inconsistent configuration: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// [`ConfigError::FileNotFound`].
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// [`ConfigError::ReadError`].
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::InvalidValue`].
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// [`ConfigError::MissingField`].
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// [`ConfigError::EnvParseError`].
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// [`ConfigError::ValidationError`].
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    /// The missing field name, if this is a [`ConfigError::MissingField`].
    #[must_use]
    pub fn missing_field_name(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } => Some(field),
            _ => None,
        }
    }
}

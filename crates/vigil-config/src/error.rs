// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types for vigil-config.

use std::path::PathBuf;
use thiserror::Error;
use vigil_opcua::OpcUaError;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file does not exist.
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// File I/O error.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration content.
    #[error("Failed to parse config '{origin}': {message}")]
    Parse {
        /// File path or `<string>`.
        origin: String,
        /// Error message.
        message: String,
    },

    /// Unsupported file extension.
    #[error("Unsupported config format: {format}")]
    UnsupportedFormat {
        /// The rejected extension.
        format: String,
    },

    /// Configuration validation failed.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// Failed to render configuration.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a file-not-found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error.
    pub fn parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported-format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns a short category name.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } | Self::Io { .. } => "io",
            Self::Parse { .. } | Self::UnsupportedFormat { .. } => "parse",
            Self::Validation { .. } => "validation",
            Self::Serialization { .. } => "serialization",
        }
    }

    /// Returns a message suitable for showing to an operator.
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { path } => {
                format!("Configuration file '{}' does not exist", path.display())
            }
            Self::Validation { field, message } => {
                format!("Invalid value for '{field}': {message}")
            }
            other => other.to_string(),
        }
    }
}

impl From<OpcUaError> for ConfigError {
    fn from(error: OpcUaError) -> Self {
        use vigil_opcua::ConfigurationError as C;

        match error {
            OpcUaError::Configuration(C::MissingField { field }) => {
                Self::validation(field, "is required")
            }
            OpcUaError::Configuration(C::InvalidValue { field, reason }) => {
                Self::validation(field, reason)
            }
            OpcUaError::Configuration(C::InvalidEndpoint { url, reason }) => {
                Self::validation("connection.endpoint", format!("{url}: {reason}"))
            }
            OpcUaError::Configuration(C::InvalidNodeId { input, reason }) => {
                Self::validation("target", format!("{input}: {reason}"))
            }
            other => Self::validation("connection", other.to_string()),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_opcua::ConfigurationError;

    #[test]
    fn test_from_opcua_error_keeps_field() {
        let err: ConfigError = OpcUaError::configuration(ConfigurationError::invalid_value(
            "poll.period",
            "Period must be greater than 0",
        ))
        .into();

        assert!(matches!(
            &err,
            ConfigError::Validation { field, .. } if field == "poll.period"
        ));
        assert_eq!(err.error_type(), "validation");
    }

    #[test]
    fn test_user_message() {
        let err = ConfigError::file_not_found("/etc/vigil.yaml");
        assert!(err.user_message().contains("/etc/vigil.yaml"));
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```yaml
//! connection:
//!   endpoint: opc.tcp://localhost:4840
//!   application_name: OPCAPP
//!   request_timeout: 5s
//! target: ns=2;s=Line1.Torque
//! poll:
//!   period: 1s
//!   initial_offset: 0s
//! subscription:
//!   publishing_interval: 2s
//! monitored_item:
//!   sampling_interval: 1s
//!   queue_size: 10
//!   discard_oldest: true
//! logging:
//!   level: info
//!   format: text
//! ```

use serde::{Deserialize, Serialize};
use vigil_opcua::{
    MonitoredItemSettings, OpcUaConfig, OpcUaError, PollSettings, SubscriptionSettings,
    VariableReference,
};

use crate::error::{ConfigError, ConfigResult};

/// Variable observed when the configuration names none.
pub const DEFAULT_TARGET: &str = "ns=2;s=d6.090-046.AATORQUE";

// =============================================================================
// VigilConfig
// =============================================================================

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigilConfig {
    /// Server connection.
    pub connection: OpcUaConfig,

    /// Observed variable.
    #[serde(default = "default_target")]
    pub target: VariableReference,

    /// Poll schedule.
    #[serde(default)]
    pub poll: PollSettings,

    /// Subscription parameters.
    #[serde(default)]
    pub subscription: SubscriptionSettings,

    /// Monitored-item parameters.
    #[serde(default)]
    pub monitored_item: MonitoredItemSettings,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_target() -> VariableReference {
    VariableReference::new(2, "d6.090-046.AATORQUE")
}

impl VigilConfig {
    /// Creates a configuration for `endpoint` with every other value defaulted.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            connection: OpcUaConfig::new(endpoint),
            target: default_target(),
            poll: PollSettings::default(),
            subscription: SubscriptionSettings::default(),
            monitored_item: MonitoredItemSettings::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validates every section.
    pub fn validate(&self) -> ConfigResult<()> {
        self.connection
            .validate()
            .map_err(|e| scoped("connection", e))?;
        self.poll.validate()?;
        self.subscription.validate()?;
        self.monitored_item.validate()?;

        if self.poll.read_timeout > self.poll.period.saturating_mul(60) {
            tracing::warn!(
                period = ?self.poll.period,
                read_timeout = ?self.poll.read_timeout,
                "Poll read timeout is far longer than the period"
            );
        }

        Ok(())
    }
}

/// Converts a library error and qualifies its field with `section`.
fn scoped(section: &str, error: OpcUaError) -> ConfigError {
    match ConfigError::from(error) {
        ConfigError::Validation { field, message } if !field.starts_with(section) => {
            ConfigError::validation(format!("{section}.{field}"), message)
        }
        other => other,
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Log format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive for this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Compact single-line text.
    Compact,
    /// JSON lines.
    Json,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = VigilConfig::new("opc.tcp://localhost:4840");
        assert_eq!(config.target.to_string(), DEFAULT_TARGET);
        assert_eq!(config.connection.application_name, "OPCAPP");
        assert_eq!(config.connection.request_timeout, Duration::from_secs(5));
        assert_eq!(config.poll.period, Duration::from_secs(1));
        assert_eq!(config.poll.initial_offset, Duration::ZERO);
        assert_eq!(config.subscription.publishing_interval, Duration::from_secs(2));
        assert_eq!(config.monitored_item.sampling_interval, Duration::from_secs(1));
        assert_eq!(config.monitored_item.queue_size, 10);
        assert!(config.monitored_item.discard_oldest);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_errors_are_scoped() {
        let config = VigilConfig::new("http://localhost");
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation { ref field, .. } if field == "connection.endpoint"
        ));

        let mut config = VigilConfig::new("opc.tcp://localhost:4840");
        config.connection.request_timeout = Duration::ZERO;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation { ref field, .. } if field == "connection.request_timeout"
        ));
    }

    #[test]
    fn test_zero_period_rejected() {
        let mut config = VigilConfig::new("opc.tcp://localhost:4840");
        config.poll.period = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "poll.period"
        ));
    }

    #[test]
    fn test_log_level_as_str() {
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::default().as_str(), "info");
    }
}

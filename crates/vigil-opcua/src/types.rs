// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core types for the observation layer.
//!
//! This module contains the variable addressing type and the plain
//! parameter structs callers hand to the session, the poll scheduler and the
//! subscription manager. None of these hold state; they are read once when
//! the observation they configure starts.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, OpcUaError, OpcUaResult};

// =============================================================================
// VariableReference
// =============================================================================

/// Addresses one variable on the remote server.
///
/// A reference is the pair (namespace index, string identifier). It renders
/// to and parses from the OPC UA string form `ns=<index>;s=<identifier>`;
/// namespace 0 renders without the `ns=` prefix.
///
/// # Examples
///
/// ```
/// use vigil_opcua::types::VariableReference;
///
/// let target = VariableReference::new(2, "X.Y");
/// assert_eq!(target.to_string(), "ns=2;s=X.Y");
///
/// let parsed: VariableReference = "ns=2;s=X.Y".parse().unwrap();
/// assert_eq!(parsed, target);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariableReference {
    namespace_index: u16,
    identifier: String,
}

impl VariableReference {
    /// Creates a new reference.
    pub fn new(namespace_index: u16, identifier: impl Into<String>) -> Self {
        Self {
            namespace_index,
            identifier: identifier.into(),
        }
    }

    /// Returns the namespace index.
    #[inline]
    pub fn namespace_index(&self) -> u16 {
        self.namespace_index
    }

    /// Returns the string identifier.
    #[inline]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the OPC UA string form.
    pub fn to_opc_string(&self) -> String {
        if self.namespace_index == 0 {
            format!("s={}", self.identifier)
        } else {
            format!("ns={};s={}", self.namespace_index, self.identifier)
        }
    }
}

impl fmt::Display for VariableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_opc_string())
    }
}

impl FromStr for VariableReference {
    type Err = OpcUaError;

    /// Parses a reference from OPC UA string format.
    ///
    /// Supported formats:
    /// - `ns=2;s=MyNode`
    /// - `s=MyNode` (namespace 0)
    ///
    /// Whitespace is allowed before the `ns=` and `s=` prefixes. Everything
    /// after `s=` is the identifier, verbatim.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_start();
        let invalid = |reason: &str| {
            OpcUaError::configuration(ConfigurationError::invalid_node_id(s, reason))
        };

        let (namespace_index, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns_str, id) = rest
                    .split_once(';')
                    .ok_or_else(|| invalid("Missing identifier after namespace"))?;
                let ns: u16 = ns_str
                    .trim()
                    .parse()
                    .map_err(|_| invalid("Invalid namespace index"))?;
                (ns, id.trim_start())
            }
            None => (0, s),
        };

        let identifier = identifier_part.strip_prefix("s=").ok_or_else(|| {
            invalid("Only string identifiers (s=) are supported for variable references")
        })?;

        if identifier.is_empty() {
            return Err(invalid("Identifier must not be empty"));
        }

        Ok(Self::new(namespace_index, identifier))
    }
}

impl TryFrom<String> for VariableReference {
    type Error = OpcUaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VariableReference> for String {
    fn from(reference: VariableReference) -> Self {
        reference.to_opc_string()
    }
}

// =============================================================================
// OpcUaConfig
// =============================================================================

/// Connection parameters handed to a [`SessionProvider`](crate::client::SessionProvider).
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use vigil_opcua::types::OpcUaConfig;
///
/// let config = OpcUaConfig::builder()
///     .endpoint("opc.tcp://localhost:4840")
///     .application_name("OPCAPP")
///     .request_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
///
/// assert_eq!(config.effective_application_uri(), "urn:vigil:opcua:OPCAPP");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpcUaConfig {
    /// Server endpoint URL (e.g., "opc.tcp://localhost:4840").
    pub endpoint: String,

    /// Application name announced to the server.
    #[serde(default = "default_application_name")]
    pub application_name: String,

    /// Application URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_uri: Option<String>,

    /// Session timeout requested from the server.
    #[serde(default = "default_session_timeout", with = "humantime_serde")]
    pub session_timeout: Duration,

    /// Timeout applied to every service request.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Timeout for endpoint discovery and session establishment.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
}

fn default_application_name() -> String {
    "OPCAPP".to_string()
}

fn default_session_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

impl OpcUaConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> OpcUaConfigBuilder {
        OpcUaConfigBuilder::default()
    }

    /// Creates a simple configuration with just the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Validates this configuration.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.endpoint.is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                "endpoint",
            )));
        }

        if !self.endpoint.starts_with("opc.tcp://") {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_endpoint(
                &self.endpoint,
                "Endpoint must start with opc.tcp://",
            )));
        }

        if self.application_name.trim().is_empty() {
            return Err(OpcUaError::configuration(ConfigurationError::missing_field(
                "application_name",
            )));
        }

        for (field, value) in [
            ("session_timeout", self.session_timeout),
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
        ] {
            if value.is_zero() {
                return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                    field,
                    "Timeout must be greater than 0",
                )));
            }
        }

        Ok(())
    }

    /// Returns the effective application URI.
    pub fn effective_application_uri(&self) -> String {
        self.application_uri.clone().unwrap_or_else(|| {
            format!("urn:vigil:opcua:{}", self.application_name.replace(' ', ""))
        })
    }
}

impl Default for OpcUaConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            application_name: default_application_name(),
            application_uri: None,
            session_timeout: default_session_timeout(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

// =============================================================================
// OpcUaConfigBuilder
// =============================================================================

/// Builder for `OpcUaConfig`.
#[derive(Debug, Default)]
pub struct OpcUaConfigBuilder {
    endpoint: Option<String>,
    application_name: Option<String>,
    application_uri: Option<String>,
    session_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl OpcUaConfigBuilder {
    /// Sets the server endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the application name.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Sets the application URI.
    pub fn application_uri(mut self, uri: impl Into<String>) -> Self {
        self.application_uri = Some(uri.into());
        self
    }

    /// Sets the session timeout.
    pub fn session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Sets the request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> OpcUaResult<OpcUaConfig> {
        let config = OpcUaConfig {
            endpoint: self.endpoint.unwrap_or_default(),
            application_name: self
                .application_name
                .unwrap_or_else(default_application_name),
            application_uri: self.application_uri,
            session_timeout: self.session_timeout.unwrap_or_else(default_session_timeout),
            request_timeout: self.request_timeout.unwrap_or_else(default_request_timeout),
            connect_timeout: self.connect_timeout.unwrap_or_else(default_connect_timeout),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// PollSettings
// =============================================================================

/// Schedule and wait bound of one poll task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    /// Time between tick start slots.
    #[serde(default = "default_poll_period", with = "humantime_serde")]
    pub period: Duration,

    /// Delay before the first tick.
    #[serde(default, with = "humantime_serde")]
    pub initial_offset: Duration,

    /// Upper bound on one read round trip.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
}

fn default_poll_period() -> Duration {
    Duration::from_millis(1000)
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            period: default_poll_period(),
            initial_offset: Duration::ZERO,
            read_timeout: default_request_timeout(),
        }
    }
}

impl PollSettings {
    /// Creates settings with the given period and initial offset.
    pub fn new(period: Duration, initial_offset: Duration) -> Self {
        Self {
            period,
            initial_offset,
            ..Default::default()
        }
    }

    /// Sets the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Validates the settings.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.period.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "poll.period",
                "Period must be greater than 0",
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "poll.read_timeout",
                "Read timeout must be greater than 0",
            )));
        }
        Ok(())
    }
}

// =============================================================================
// SubscriptionSettings
// =============================================================================

/// OPC UA subscription parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionSettings {
    /// Publishing interval.
    #[serde(default = "default_publishing_interval", with = "humantime_serde")]
    pub publishing_interval: Duration,

    /// Lifetime count (number of publishing intervals before subscription expires).
    #[serde(default = "default_lifetime_count")]
    pub lifetime_count: u32,

    /// Max keep-alive count.
    #[serde(default = "default_keepalive_count")]
    pub keepalive_count: u32,

    /// Maximum notifications per publish.
    #[serde(default = "default_max_notifications")]
    pub max_notifications_per_publish: u32,

    /// Priority (0-255, higher is more important).
    #[serde(default)]
    pub priority: u8,

    /// Publishing enabled.
    #[serde(default = "default_true")]
    pub publishing_enabled: bool,
}

fn default_publishing_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_lifetime_count() -> u32 {
    60
}

fn default_keepalive_count() -> u32 {
    10
}

fn default_max_notifications() -> u32 {
    65535
}

fn default_true() -> bool {
    true
}

impl Default for SubscriptionSettings {
    fn default() -> Self {
        Self {
            publishing_interval: default_publishing_interval(),
            lifetime_count: default_lifetime_count(),
            keepalive_count: default_keepalive_count(),
            max_notifications_per_publish: default_max_notifications(),
            priority: 0,
            publishing_enabled: true,
        }
    }
}

impl SubscriptionSettings {
    /// Creates settings with custom publishing interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            publishing_interval: interval,
            ..Default::default()
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.publishing_interval.is_zero() {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "subscription.publishing_interval",
                "Publishing interval must be greater than 0",
            )));
        }
        // The server expires a subscription after lifetime_count silent intervals,
        // which must outlast at least three keep-alives.
        if self.lifetime_count < self.keepalive_count.saturating_mul(3) {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "subscription.lifetime_count",
                "Lifetime count must be at least three times the keep-alive count",
            )));
        }
        Ok(())
    }
}

// =============================================================================
// MonitoredItemSettings
// =============================================================================

/// Settings applied to every monitored item a subscription creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredItemSettings {
    /// Sampling interval.
    #[serde(default = "default_sampling_interval", with = "humantime_serde")]
    pub sampling_interval: Duration,

    /// Server-side queue size for buffered values.
    #[serde(default = "default_queue_size")]
    pub queue_size: u32,

    /// Drop the oldest buffered value when the queue is full.
    #[serde(default = "default_true")]
    pub discard_oldest: bool,

    /// Monitoring mode.
    #[serde(default)]
    pub monitoring_mode: MonitoringMode,
}

fn default_sampling_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_queue_size() -> u32 {
    10
}

impl Default for MonitoredItemSettings {
    fn default() -> Self {
        Self {
            sampling_interval: default_sampling_interval(),
            queue_size: default_queue_size(),
            discard_oldest: true,
            monitoring_mode: MonitoringMode::default(),
        }
    }
}

impl MonitoredItemSettings {
    /// Creates settings with custom sampling interval.
    pub fn with_sampling_interval(interval: Duration) -> Self {
        Self {
            sampling_interval: interval,
            ..Default::default()
        }
    }

    /// Validates the settings.
    pub fn validate(&self) -> OpcUaResult<()> {
        if self.queue_size == 0 {
            return Err(OpcUaError::configuration(ConfigurationError::invalid_value(
                "monitored_item.queue_size",
                "Queue size must be at least 1",
            )));
        }
        Ok(())
    }
}

// =============================================================================
// MonitoringMode
// =============================================================================

/// Monitoring mode for monitored items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    /// Disabled - no sampling or reporting.
    Disabled,
    /// Sampling - sample but don't report.
    Sampling,
    /// Reporting - sample and report changes.
    #[default]
    Reporting,
}

impl MonitoringMode {
    /// Returns the OPC UA numeric value.
    pub fn value(&self) -> u32 {
        match self {
            Self::Disabled => 0,
            Self::Sampling => 1,
            Self::Reporting => 2,
        }
    }
}

impl fmt::Display for MonitoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "Disabled"),
            Self::Sampling => write!(f, "Sampling"),
            Self::Reporting => write!(f, "Reporting"),
        }
    }
}

// =============================================================================
// AttributeId
// =============================================================================

/// Node attributes the observation layer reads or monitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeId {
    /// The node's display name.
    DisplayName,
    /// The variable's current value.
    Value,
}

impl AttributeId {
    /// Returns the OPC UA attribute id.
    pub fn value(&self) -> u32 {
        match self {
            Self::DisplayName => 4,
            Self::Value => 13,
        }
    }
}

// =============================================================================
// Humantime Serde Helper
// =============================================================================

mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*duration)
            .to_string()
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tests
// =============================================================================

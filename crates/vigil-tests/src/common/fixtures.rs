// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built endpoints, targets, settings and configuration documents.

use std::io::Write;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tempfile::NamedTempFile;
use vigil_opcua::{
    MonitoredItemSettings, OpcUaConfig, OpcUaValue, PollSettings, StatusCode,
    SubscriptionSettings, ValueSample, VariableReference,
};

// =============================================================================
// Targets
// =============================================================================

/// Endpoints and variables used across suites.
pub struct TargetFixtures;

impl TargetFixtures {
    /// The mock server endpoint.
    pub fn endpoint() -> &'static str {
        "opc.tcp://host:4840"
    }

    /// Connection settings for [`Self::endpoint`].
    pub fn connection() -> OpcUaConfig {
        OpcUaConfig::new(Self::endpoint())
    }

    /// The primary observed variable, `ns=2;s=X.Y`.
    pub fn target() -> VariableReference {
        VariableReference::new(2, "X.Y")
    }

    /// A second variable for multi-target tests.
    pub fn other_target() -> VariableReference {
        VariableReference::new(2, "X.Z")
    }

    /// A variable the mock server rejects when told to.
    pub fn unknown_target() -> VariableReference {
        VariableReference::new(2, "Does.Not.Exist")
    }
}

// =============================================================================
// Samples
// =============================================================================

/// Sample builders.
pub struct SampleFixtures;

impl SampleFixtures {
    /// A good sample with fixed timestamps.
    pub fn good(value: impl Into<OpcUaValue>) -> ValueSample {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).single().unwrap_or_else(Utc::now);
        ValueSample::new(value)
            .with_source_timestamp(at)
            .with_server_timestamp(at)
    }

    /// A sample carrying an uncertain status.
    pub fn uncertain(value: impl Into<OpcUaValue>) -> ValueSample {
        ValueSample::new(value).with_status(StatusCode::UNCERTAIN_LAST_USABLE_VALUE)
    }

    /// `count` integer samples `1..=count`.
    pub fn sequence(count: i32) -> Vec<ValueSample> {
        (1..=count).map(|i| ValueSample::new(OpcUaValue::Int32(i))).collect()
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Observation settings.
pub struct SettingsFixtures;

impl SettingsFixtures {
    /// One-second polling with no offset.
    pub fn default_poll() -> PollSettings {
        PollSettings::default()
    }

    /// Polling every `period_ms` with no offset.
    pub fn poll_every(period_ms: u64) -> PollSettings {
        PollSettings::new(Duration::from_millis(period_ms), Duration::ZERO)
    }

    /// Subscription with the default two-second publishing interval.
    pub fn subscription() -> SubscriptionSettings {
        SubscriptionSettings::default()
    }

    /// Monitored item with the given queue size and discard-oldest.
    pub fn monitored_item(queue_size: u32) -> MonitoredItemSettings {
        MonitoredItemSettings {
            queue_size,
            ..Default::default()
        }
    }
}

// =============================================================================
// Configuration Documents
// =============================================================================

/// Configuration files in every supported format.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// A complete YAML configuration.
    pub fn yaml() -> &'static str {
        r#"
connection:
  endpoint: opc.tcp://plc.local:4840
  application_name: OPCAPP
  request_timeout: 5s
target: "ns=2;s=Line1.Torque"
poll:
  period: 500ms
  initial_offset: 250ms
  read_timeout: 2s
subscription:
  publishing_interval: 2s
  lifetime_count: 60
monitored_item:
  sampling_interval: 1s
  queue_size: 10
  discard_oldest: true
logging:
  level: debug
  format: json
"#
    }

    /// A TOML configuration.
    pub fn toml() -> &'static str {
        r#"
target = "ns=3;s=Line2.Speed"

[connection]
endpoint = "opc.tcp://plc.local:4841"
connect_timeout = "3s"

[poll]
period = "1s"

[monitored_item]
queue_size = 5
"#
    }

    /// A JSON configuration.
    pub fn json() -> &'static str {
        r#"{
  "connection": { "endpoint": "opc.tcp://plc.local:4842" },
  "subscription": { "publishing_interval": "1s", "priority": 5 }
}"#
    }

    /// A YAML document with a placeholder for the endpoint.
    pub fn yaml_with_placeholder() -> &'static str {
        r#"
connection:
  endpoint: "${VIGIL_TEST_PLC:opc.tcp://fallback:4840}"
"#
    }

    /// Writes `content` to a temporary file with `extension`.
    pub fn write_temp(content: &str, extension: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{extension}"))
            .tempfile()
            .expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write temp file");
        file
    }
}

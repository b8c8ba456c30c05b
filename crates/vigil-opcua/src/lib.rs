// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA value observation.
//!
//! This crate observes the value of OPC UA variables over one shared client
//! session, either by polling on a fixed schedule or through a server-side
//! subscription. Every observed sample is fanned out through a
//! [`ValueDispatcher`](observe::ValueDispatcher).
//!
//! # Features
//!
//! - Fixed-rate polling with initial offset, bounded reads and no overlapping ticks
//! - Subscription lifecycle with idempotent teardown
//! - Session-unique client handles for monitored items
//! - Pluggable value sinks (tracing, channel, bounded queue)
//! - `real-transport`: session provider over the `opcua` crate
//!
//! # Error Handling
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Endpoint discovery and session establishment
//! ├── Read          - Value reads
//! ├── Registration  - Subscription and monitored-item creation
//! ├── Teardown      - Subscription deletion and disconnect
//! └── Configuration - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vigil_opcua::client::RealSessionProvider;
//! use vigil_opcua::observe::{ObservationContext, TracingSink, ValueDispatcher};
//! use vigil_opcua::types::{OpcUaConfig, PollSettings, VariableReference};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = OpcUaConfig::new("opc.tcp://localhost:4840");
//!     let dispatcher = Arc::new(ValueDispatcher::new().with_sink(Arc::new(TracingSink::new())));
//!
//!     let context = ObservationContext::connect(&RealSessionProvider::new(), &config, dispatcher).await?;
//!     let target: VariableReference = "ns=2;s=Line1.Torque".parse()?;
//!
//!     let manager = context.subscription(target);
//!     manager.register().await?;
//!     tokio::signal::ctrl_c().await?;
//!     manager.unregister().await;
//!
//!     context.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod error;
pub mod observe;
pub mod types;

// Re-export commonly used types
pub use error::{
    ConfigurationError, ConnectionError, ErrorCode, ErrorSeverity, OpcUaError, OpcUaResult,
    ReadError, RegistrationError, TeardownError,
};

pub use types::{
    AttributeId, MonitoredItemSettings, MonitoringMode, OpcUaConfig, OpcUaConfigBuilder,
    PollSettings, SubscriptionSettings, VariableReference,
};

pub use client::{
    MonitoredItemRequest, MonitoredItemResult, ObservationSession, OpcUaValue, SessionProvider,
    StatusCode, SubscriptionId, ValueConsumer, ValueSample,
};

#[cfg(feature = "real-transport")]
pub use client::{RealSession, RealSessionProvider};

pub use observe::{
    ClientHandle, ClientHandleGenerator, ObservationContext, OverflowPolicy, PollExit,
    PollScheduler, PollTask, PollTaskId, RegistrationReport, SampleQueue, SubscriptionManager,
    SubscriptionState, ValueDispatcher, ValueSink,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session provider contract.
//!
//! The observation layer never talks to the wire itself. It consumes an
//! [`ObservationSession`] obtained from a [`SessionProvider`], which keeps the
//! layer testable against an in-memory session and lets the `opcua` client
//! stack sit behind the `real-transport` feature.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::value::{StatusCode, ValueSample};
use crate::error::OpcUaResult;
use crate::observe::handle::ClientHandle;
use crate::types::{
    AttributeId, MonitoredItemSettings, MonitoringMode, OpcUaConfig, SubscriptionSettings,
    VariableReference,
};

// =============================================================================
// SubscriptionId
// =============================================================================

/// Server-assigned subscription id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u32);

impl SubscriptionId {
    /// Creates a new subscription ID.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl From<u32> for SubscriptionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// =============================================================================
// ValueConsumer
// =============================================================================

/// Receiver of publish events for monitored items.
///
/// The session calls [`on_value`](Self::on_value) once per publish event per
/// item, in the order the events arrive, on its own notification path.
/// Implementations must deliver exactly one sample per call and must not
/// block: anything slow belongs behind a queue or channel.
pub trait ValueConsumer: Send + Sync {
    /// Delivers the sample published for the item with `client_handle`.
    fn on_value(&self, client_handle: ClientHandle, sample: ValueSample);
}

// =============================================================================
// MonitoredItemRequest / MonitoredItemResult
// =============================================================================

/// Parameters for creating one monitored item.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemRequest {
    /// Handle the server echoes back in notifications.
    pub client_handle: ClientHandle,

    /// Variable to monitor.
    pub target: VariableReference,

    /// Attribute to monitor.
    pub attribute: AttributeId,

    /// Monitoring mode.
    pub monitoring_mode: MonitoringMode,

    /// Requested sampling interval.
    pub sampling_interval: Duration,

    /// Requested server-side queue size.
    pub queue_size: u32,

    /// Discard the oldest queued value on overflow.
    pub discard_oldest: bool,
}

impl MonitoredItemRequest {
    /// Creates a request on the `Value` attribute using `settings`.
    pub fn value(
        client_handle: ClientHandle,
        target: VariableReference,
        settings: &MonitoredItemSettings,
    ) -> Self {
        Self {
            client_handle,
            target,
            attribute: AttributeId::Value,
            monitoring_mode: settings.monitoring_mode,
            sampling_interval: settings.sampling_interval,
            queue_size: settings.queue_size,
            discard_oldest: settings.discard_oldest,
        }
    }
}

/// Per-item outcome of a monitored-item creation call.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItemResult {
    /// Handle from the request.
    pub client_handle: ClientHandle,

    /// Target from the request.
    pub target: VariableReference,

    /// Creation status.
    pub status_code: StatusCode,

    /// Server-assigned monitored item id (0 when creation failed).
    pub monitored_item_id: u32,

    /// Sampling interval the server settled on.
    pub revised_sampling_interval: Duration,

    /// Queue size the server settled on.
    pub revised_queue_size: u32,
}

impl MonitoredItemResult {
    /// Creates a successful result echoing the request's parameters.
    pub fn accepted(request: &MonitoredItemRequest, monitored_item_id: u32) -> Self {
        Self {
            client_handle: request.client_handle,
            target: request.target.clone(),
            status_code: StatusCode::GOOD,
            monitored_item_id,
            revised_sampling_interval: request.sampling_interval,
            revised_queue_size: request.queue_size,
        }
    }

    /// Creates a failed result.
    pub fn rejected(request: &MonitoredItemRequest, status_code: StatusCode) -> Self {
        Self {
            client_handle: request.client_handle,
            target: request.target.clone(),
            status_code,
            monitored_item_id: 0,
            revised_sampling_interval: Duration::ZERO,
            revised_queue_size: 0,
        }
    }
}

// =============================================================================
// SessionProvider / ObservationSession
// =============================================================================

/// Establishes sessions.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Session type this provider produces.
    type Session: ObservationSession + 'static;

    /// Discovers the endpoint and opens a session.
    ///
    /// # Errors
    ///
    /// Returns a connection error if no session can be established.
    async fn connect(&self, config: &OpcUaConfig) -> OpcUaResult<Self::Session>;
}

/// A connected session shared by every observation bound to it.
///
/// Methods take `&self`; the session is shared through an `Arc` and any
/// locking it needs is its own business.
#[async_trait]
pub trait ObservationSession: Send + Sync {
    /// Returns the endpoint URL this session is connected to.
    fn endpoint(&self) -> &str;

    /// Returns `true` while the session is usable.
    fn is_connected(&self) -> bool;

    /// Reads the current value of `target`.
    ///
    /// A non-good status is returned inside the sample, not as an error.
    async fn read_value(&self, target: &VariableReference) -> OpcUaResult<ValueSample>;

    /// Resolves the display name of `target`.
    async fn display_name(&self, target: &VariableReference) -> OpcUaResult<String>;

    /// Creates a subscription and returns its id.
    async fn create_subscription(
        &self,
        settings: &SubscriptionSettings,
    ) -> OpcUaResult<SubscriptionId>;

    /// Creates monitored items on `subscription_id`.
    ///
    /// `consumer` is attached before any item starts reporting, so the first
    /// publish event already reaches it. The returned results are in request
    /// order.
    async fn create_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        requests: &[MonitoredItemRequest],
        consumer: Arc<dyn ValueConsumer>,
    ) -> OpcUaResult<Vec<MonitoredItemResult>>;

    /// Deletes a subscription and all of its monitored items.
    async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()>;

    /// Closes the session.
    async fn disconnect(&self) -> OpcUaResult<()>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> MonitoredItemRequest {
        MonitoredItemRequest::value(
            ClientHandle::new(5),
            VariableReference::new(2, "X.Y"),
            &MonitoredItemSettings::default(),
        )
    }

    #[test]
    fn test_subscription_id() {
        let id = SubscriptionId::new(42);
        assert_eq!(id.value(), 42);
        assert_eq!(id.to_string(), "sub-42");
        assert_eq!(SubscriptionId::from(100u32).value(), 100);
    }

    #[test]
    fn test_value_request_uses_settings() {
        let request = request();
        assert_eq!(request.attribute, AttributeId::Value);
        assert_eq!(request.monitoring_mode, MonitoringMode::Reporting);
        assert_eq!(request.sampling_interval, Duration::from_secs(1));
        assert_eq!(request.queue_size, 10);
        assert!(request.discard_oldest);
    }

    #[test]
    fn test_item_results() {
        let request = request();

        let ok = MonitoredItemResult::accepted(&request, 9);
        assert!(ok.status_code.is_good());
        assert_eq!(ok.client_handle, ClientHandle::new(5));
        assert_eq!(ok.revised_queue_size, 10);

        let failed = MonitoredItemResult::rejected(&request, StatusCode::BAD_NODE_ID_UNKNOWN);
        assert!(failed.status_code.is_bad());
        assert_eq!(failed.monitored_item_id, 0);
        assert_eq!(failed.target, request.target);
    }
}

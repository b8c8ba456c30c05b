// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! An in-memory OPC UA server good enough to drive the observation layer.
//!
//! - Values are injected per variable and served by `read_value`.
//! - Subscriptions are accounted for, so tests can assert nothing is left
//!   behind after teardown.
//! - Each monitored item owns a server-side queue with the requested size and
//!   discard policy. [`MockSession::record_change`] samples into it and
//!   [`MockSession::publish`] flushes it to the consumer, like one publish
//!   cycle.
//! - Failures are injected per operation.

use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;

use vigil_opcua::observe::ValueSink;
use vigil_opcua::{
    ClientHandle, ConnectionError, MonitoredItemRequest, MonitoredItemResult, ObservationSession,
    OpcUaConfig, OpcUaError, OpcUaResult, OpcUaValue, OverflowPolicy, RegistrationError,
    SampleQueue, SessionProvider, StatusCode, SubscriptionId, SubscriptionSettings,
    TeardownError, ValueConsumer, ValueSample, VariableReference,
};

// =============================================================================
// Mock Session
// =============================================================================

/// One monitored item on the mock server.
struct MockItem {
    client_handle: ClientHandle,
    target: VariableReference,
    queue: SampleQueue<ValueSample>,
}

/// One subscription on the mock server.
struct MockSubscription {
    settings: SubscriptionSettings,
    consumer: Option<Arc<dyn ValueConsumer>>,
    items: Vec<MockItem>,
}

/// A scripted in-memory session.
pub struct MockSession {
    endpoint: String,

    /// Current value per variable.
    values: RwLock<HashMap<VariableReference, ValueSample>>,

    /// Display name per variable.
    display_names: RwLock<HashMap<VariableReference, String>>,

    /// Variables whose monitored-item creation is rejected.
    rejected: RwLock<HashSet<VariableReference>>,

    /// Live subscriptions.
    subscriptions: Mutex<HashMap<SubscriptionId, MockSubscription>>,

    connected: AtomicBool,
    read_latency: Mutex<Duration>,

    fail_next_read: AtomicBool,
    fail_all_reads: AtomicBool,
    fail_create_subscription: AtomicBool,
    fail_create_items: AtomicBool,
    fail_delete: AtomicBool,
    fail_disconnect: AtomicBool,

    next_subscription_id: AtomicU32,
    next_item_id: AtomicU32,

    read_count: AtomicU64,
    subscriptions_created: AtomicU64,
    subscriptions_deleted: AtomicU64,
    disconnect_count: AtomicU64,
}

impl MockSession {
    /// Creates a connected session for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            values: RwLock::new(HashMap::new()),
            display_names: RwLock::new(HashMap::new()),
            rejected: RwLock::new(HashSet::new()),
            subscriptions: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(true),
            read_latency: Mutex::new(Duration::ZERO),
            fail_next_read: AtomicBool::new(false),
            fail_all_reads: AtomicBool::new(false),
            fail_create_subscription: AtomicBool::new(false),
            fail_create_items: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
            fail_disconnect: AtomicBool::new(false),
            next_subscription_id: AtomicU32::new(1),
            next_item_id: AtomicU32::new(1),
            read_count: AtomicU64::new(0),
            subscriptions_created: AtomicU64::new(0),
            subscriptions_deleted: AtomicU64::new(0),
            disconnect_count: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Sets the value served for `target`.
    pub fn set_value(&self, target: VariableReference, value: impl Into<OpcUaValue>) {
        self.values.write().insert(target, ValueSample::new(value));
    }

    /// Sets the full sample served for `target`.
    pub fn set_sample(&self, target: VariableReference, sample: ValueSample) {
        self.values.write().insert(target, sample);
    }

    /// Sets the display name of `target`.
    pub fn set_display_name(&self, target: VariableReference, name: impl Into<String>) {
        self.display_names.write().insert(target, name.into());
    }

    /// Makes monitored-item creation for `target` fail with `Bad_NodeIdUnknown`.
    pub fn reject_target(&self, target: VariableReference) {
        self.rejected.write().insert(target);
    }

    /// Delays every read by `latency`.
    pub fn set_read_latency(&self, latency: Duration) {
        *self.read_latency.lock() = latency;
    }

    /// Fails the next read only.
    pub fn fail_next_read(&self) {
        self.fail_next_read.store(true, Ordering::SeqCst);
    }

    /// Fails every read while set.
    pub fn fail_all_reads(&self, fail: bool) {
        self.fail_all_reads.store(fail, Ordering::SeqCst);
    }

    /// Fails subscription creation while set.
    pub fn fail_create_subscription(&self, fail: bool) {
        self.fail_create_subscription.store(fail, Ordering::SeqCst);
    }

    /// Fails the whole monitored-item request while set.
    pub fn fail_create_items(&self, fail: bool) {
        self.fail_create_items.store(fail, Ordering::SeqCst);
    }

    /// Fails subscription deletion while set. The subscription is kept.
    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Fails disconnect while set.
    pub fn fail_disconnect(&self, fail: bool) {
        self.fail_disconnect.store(fail, Ordering::SeqCst);
    }

    /// Simulates a lost connection: later calls fail with `NotConnected`.
    pub fn drop_connection(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    // =========================================================================
    // Server-side sampling and publishing
    // =========================================================================

    /// Updates `target` and samples the change into every monitored item on it.
    ///
    /// Returns the number of items that sampled the change.
    pub fn record_change(&self, target: &VariableReference, value: impl Into<OpcUaValue>) -> usize {
        let sample = ValueSample::new(value);
        self.values.write().insert(target.clone(), sample.clone());

        let subscriptions = self.subscriptions.lock();
        let mut sampled = 0;
        for subscription in subscriptions.values() {
            for item in subscription.items.iter().filter(|i| &i.target == target) {
                item.queue.push(sample.clone());
                sampled += 1;
            }
        }
        sampled
    }

    /// Runs one publish cycle: drains every item queue to its consumer.
    ///
    /// Returns the number of samples delivered.
    pub fn publish(&self) -> usize {
        let mut batches = Vec::new();
        {
            let subscriptions = self.subscriptions.lock();
            for subscription in subscriptions.values() {
                let Some(consumer) = &subscription.consumer else {
                    continue;
                };
                for item in &subscription.items {
                    let samples = item.queue.drain();
                    if !samples.is_empty() {
                        batches.push((Arc::clone(consumer), item.client_handle, samples));
                    }
                }
            }
        }

        let mut delivered = 0;
        for (consumer, handle, samples) in batches {
            for sample in samples {
                consumer.on_value(handle, sample);
                delivered += 1;
            }
        }
        delivered
    }

    /// Records a change and publishes it at once.
    pub fn notify(&self, target: &VariableReference, value: impl Into<OpcUaValue>) -> usize {
        self.record_change(target, value);
        self.publish()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the number of live subscriptions.
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.lock().len()
    }

    /// Returns the number of monitored items across live subscriptions.
    pub fn monitored_item_count(&self) -> usize {
        self.subscriptions
            .lock()
            .values()
            .map(|s| s.items.len())
            .sum()
    }

    /// Returns the client handles of every live monitored item.
    pub fn client_handles(&self) -> Vec<ClientHandle> {
        let mut handles: Vec<_> = self
            .subscriptions
            .lock()
            .values()
            .flat_map(|s| s.items.iter().map(|i| i.client_handle))
            .collect();
        handles.sort();
        handles
    }

    /// Returns the settings of a live subscription.
    pub fn subscription_settings(&self, id: SubscriptionId) -> Option<SubscriptionSettings> {
        self.subscriptions.lock().get(&id).map(|s| s.settings.clone())
    }

    /// Returns how many reads were served or attempted.
    pub fn read_count(&self) -> u64 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Returns how many subscriptions were created.
    pub fn subscriptions_created(&self) -> u64 {
        self.subscriptions_created.load(Ordering::SeqCst)
    }

    /// Returns how many subscriptions were deleted.
    pub fn subscriptions_deleted(&self) -> u64 {
        self.subscriptions_deleted.load(Ordering::SeqCst)
    }

    /// Returns how many times disconnect was called.
    pub fn disconnect_count(&self) -> u64 {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> OpcUaResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OpcUaError::not_connected())
        }
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new("opc.tcp://host:4840")
    }
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("endpoint", &self.endpoint)
            .field("subscriptions", &self.active_subscriptions())
            .field("reads", &self.read_count())
            .finish()
    }
}

#[async_trait]
impl ObservationSession for MockSession {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_value(&self, target: &VariableReference) -> OpcUaResult<ValueSample> {
        self.read_count.fetch_add(1, Ordering::SeqCst);

        let latency = *self.read_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.ensure_connected()?;
        if self.fail_all_reads.load(Ordering::SeqCst)
            || self.fail_next_read.swap(false, Ordering::SeqCst)
        {
            return Err(OpcUaError::read_failed(target.to_string(), "injected read failure"));
        }

        Ok(self
            .values
            .read()
            .get(target)
            .cloned()
            .unwrap_or_else(|| {
                ValueSample::new(OpcUaValue::Null).with_status(StatusCode::BAD_NODE_ID_UNKNOWN)
            }))
    }

    async fn display_name(&self, target: &VariableReference) -> OpcUaResult<String> {
        self.ensure_connected()?;
        Ok(self
            .display_names
            .read()
            .get(target)
            .cloned()
            .unwrap_or_else(|| target.identifier().to_string()))
    }

    async fn create_subscription(
        &self,
        settings: &SubscriptionSettings,
    ) -> OpcUaResult<SubscriptionId> {
        self.ensure_connected()?;
        if self.fail_create_subscription.load(Ordering::SeqCst) {
            return Err(RegistrationError::subscription_failed("injected failure").into());
        }

        let id = SubscriptionId::new(self.next_subscription_id.fetch_add(1, Ordering::SeqCst));
        self.subscriptions.lock().insert(
            id,
            MockSubscription {
                settings: settings.clone(),
                consumer: None,
                items: Vec::new(),
            },
        );
        self.subscriptions_created.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn create_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        requests: &[MonitoredItemRequest],
        consumer: Arc<dyn ValueConsumer>,
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        self.ensure_connected()?;
        if self.fail_create_items.load(Ordering::SeqCst) {
            return Err(
                RegistrationError::request_failed(subscription_id.value(), "injected failure")
                    .into(),
            );
        }

        let rejected = self.rejected.read().clone();
        let mut subscriptions = self.subscriptions.lock();
        let subscription = subscriptions.get_mut(&subscription_id).ok_or_else(|| {
            OpcUaError::from(RegistrationError::request_failed(
                subscription_id.value(),
                "unknown subscription",
            ))
        })?;
        subscription.consumer = Some(consumer);

        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            if rejected.contains(&request.target) {
                results.push(MonitoredItemResult::rejected(
                    request,
                    StatusCode::BAD_NODE_ID_UNKNOWN,
                ));
                continue;
            }

            let id = self.next_item_id.fetch_add(1, Ordering::SeqCst);
            subscription.items.push(MockItem {
                client_handle: request.client_handle,
                target: request.target.clone(),
                queue: SampleQueue::new(
                    request.queue_size as usize,
                    OverflowPolicy::from_discard_oldest(request.discard_oldest),
                ),
            });
            results.push(MonitoredItemResult::accepted(request, id));
        }
        Ok(results)
    }

    async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()> {
        self.ensure_connected()?;
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(
                TeardownError::delete_failed(subscription_id.value(), "injected failure").into(),
            );
        }

        match self.subscriptions.lock().remove(&subscription_id) {
            Some(_) => {
                self.subscriptions_deleted.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            None => Err(TeardownError::delete_failed(
                subscription_id.value(),
                "unknown subscription",
            )
            .into()),
        }
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_disconnect.load(Ordering::SeqCst) {
            return Err(TeardownError::disconnect_failed("injected failure").into());
        }
        self.connected.store(false, Ordering::SeqCst);
        self.subscriptions.lock().clear();
        Ok(())
    }
}

// =============================================================================
// Shared Session
// =============================================================================

/// A [`MockSession`] shared between a provider and the test body.
#[derive(Debug, Clone)]
pub struct SharedMockSession(Arc<MockSession>);

impl SharedMockSession {
    /// Wraps `session`.
    pub fn new(session: Arc<MockSession>) -> Self {
        Self(session)
    }
}

impl Deref for SharedMockSession {
    type Target = MockSession;

    fn deref(&self) -> &MockSession {
        &self.0
    }
}

#[async_trait]
impl ObservationSession for SharedMockSession {
    fn endpoint(&self) -> &str {
        self.0.endpoint()
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    async fn read_value(&self, target: &VariableReference) -> OpcUaResult<ValueSample> {
        self.0.read_value(target).await
    }

    async fn display_name(&self, target: &VariableReference) -> OpcUaResult<String> {
        self.0.display_name(target).await
    }

    async fn create_subscription(
        &self,
        settings: &SubscriptionSettings,
    ) -> OpcUaResult<SubscriptionId> {
        self.0.create_subscription(settings).await
    }

    async fn create_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        requests: &[MonitoredItemRequest],
        consumer: Arc<dyn ValueConsumer>,
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        self.0
            .create_monitored_items(subscription_id, requests, consumer)
            .await
    }

    async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()> {
        self.0.delete_subscription(subscription_id).await
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.0.disconnect().await
    }
}

// =============================================================================
// Mock Session Provider
// =============================================================================

/// Hands out one shared [`MockSession`].
#[derive(Debug)]
pub struct MockSessionProvider {
    session: Arc<MockSession>,
    fail_connection: AtomicBool,
    connect_count: AtomicU64,
    last_config: Mutex<Option<OpcUaConfig>>,
}

impl MockSessionProvider {
    /// Creates a provider serving `session`.
    pub fn new(session: Arc<MockSession>) -> Self {
        Self {
            session,
            fail_connection: AtomicBool::new(false),
            connect_count: AtomicU64::new(0),
            last_config: Mutex::new(None),
        }
    }

    /// Creates a provider with a fresh session and returns both.
    pub fn with_new_session(endpoint: impl Into<String>) -> (Self, Arc<MockSession>) {
        let session = Arc::new(MockSession::new(endpoint));
        (Self::new(Arc::clone(&session)), session)
    }

    /// Returns the served session.
    pub fn session(&self) -> Arc<MockSession> {
        Arc::clone(&self.session)
    }

    /// Refuses connections while set.
    pub fn fail_connection(&self, fail: bool) {
        self.fail_connection.store(fail, Ordering::SeqCst);
    }

    /// Returns how many connections were attempted.
    pub fn connect_count(&self) -> u64 {
        self.connect_count.load(Ordering::SeqCst)
    }

    /// Returns the configuration of the last connection attempt.
    pub fn last_config(&self) -> Option<OpcUaConfig> {
        self.last_config.lock().clone()
    }
}

#[async_trait]
impl SessionProvider for MockSessionProvider {
    type Session = SharedMockSession;

    async fn connect(&self, config: &OpcUaConfig) -> OpcUaResult<SharedMockSession> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        *self.last_config.lock() = Some(config.clone());

        if self.fail_connection.load(Ordering::SeqCst) {
            return Err(ConnectionError::refused(&config.endpoint).into());
        }
        Ok(SharedMockSession::new(Arc::clone(&self.session)))
    }
}

// =============================================================================
// Recording Sink
// =============================================================================

/// A sink that records every observation.
#[derive(Debug, Default)]
pub struct RecordingSink {
    records: Mutex<Vec<(VariableReference, ValueSample)>>,
    notify: Notify,
}

impl RecordingSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded observation, in arrival order.
    pub fn records(&self) -> Vec<(VariableReference, ValueSample)> {
        self.records.lock().clone()
    }

    /// Returns the recorded values, in arrival order.
    pub fn values(&self) -> Vec<OpcUaValue> {
        self.records
            .lock()
            .iter()
            .map(|(_, sample)| sample.value.clone())
            .collect()
    }

    /// Returns the values recorded for `target`.
    pub fn values_for(&self, target: &VariableReference) -> Vec<OpcUaValue> {
        self.records
            .lock()
            .iter()
            .filter(|(reference, _)| reference == target)
            .map(|(_, sample)| sample.value.clone())
            .collect()
    }

    /// Returns the number of recorded observations.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Waits until at least `count` observations are recorded.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.notify.notified();
                if self.len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

impl ValueSink for RecordingSink {
    fn notify(&self, reference: &VariableReference, sample: &ValueSample) {
        self.records.lock().push((reference.clone(), sample.clone()));
        self.notify.notify_waiters();
    }
}

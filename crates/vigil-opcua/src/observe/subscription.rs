// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server-driven observation through a push subscription.
//!
//! A [`SubscriptionManager`] owns at most one subscription with one monitored
//! item on the `Value` attribute of its target variable.
//!
//! # State Machine
//!
//! ```text
//!                register()
//!  UNREGISTERED ────────────► REGISTERED
//!       ▲                          │
//!       └──────── unregister() ────┘
//! ```
//!
//! `unregister()` always clears the held subscription and returns without
//! waiting for the server to confirm the delete, so calling it twice is
//! harmless. The delete runs on a spawned task; callers that must see it
//! finish before closing the session await [`SubscriptionManager::wait_for_teardown`].
//!
//! # Value Delivery
//!
//! The item's consumer is attached in the same call that creates it, so the
//! first publish event is never lost. Each event is forwarded to the
//! [`ValueDispatcher`] on the session's notification path, in arrival order.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::client::transport::{
    MonitoredItemRequest, MonitoredItemResult, ObservationSession, SubscriptionId, ValueConsumer,
};
use crate::client::value::{StatusCode, ValueSample};
use crate::error::{OpcUaError, OpcUaResult, RegistrationError, TeardownError};
use crate::observe::dispatch::ValueDispatcher;
use crate::observe::handle::{ClientHandle, ClientHandleGenerator};
use crate::types::{MonitoredItemSettings, SubscriptionSettings, VariableReference};

/// Default bound on the subscription delete request.
pub const DEFAULT_TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// SubscriptionState
// =============================================================================

/// Lifecycle state of a [`SubscriptionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubscriptionState {
    /// No subscription is held.
    #[default]
    Unregistered,
    /// A subscription is held.
    Registered,
}

impl SubscriptionState {
    /// Returns `true` if a subscription is held.
    #[inline]
    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered)
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "Unregistered"),
            Self::Registered => write!(f, "Registered"),
        }
    }
}

// =============================================================================
// MonitoredItem / SubscriptionHandle
// =============================================================================

/// A monitored item as created on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredItem {
    /// Correlation handle.
    pub client_handle: ClientHandle,

    /// Monitored variable.
    pub target: VariableReference,

    /// Creation status; only good items report values.
    pub status_code: StatusCode,

    /// Server-assigned id.
    pub monitored_item_id: u32,
}

impl MonitoredItem {
    /// Returns `true` if the item was created and will report values.
    #[inline]
    pub fn is_usable(&self) -> bool {
        self.status_code.is_good()
    }
}

impl From<MonitoredItemResult> for MonitoredItem {
    fn from(result: MonitoredItemResult) -> Self {
        Self {
            client_handle: result.client_handle,
            target: result.target,
            status_code: result.status_code,
            monitored_item_id: result.monitored_item_id,
        }
    }
}

/// The subscription held by a registered manager.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionHandle {
    /// Server-assigned subscription id.
    pub subscription_id: SubscriptionId,

    /// Items created under the subscription, usable or not.
    pub items: Vec<MonitoredItem>,
}

impl SubscriptionHandle {
    /// Returns the items that report values.
    pub fn usable_items(&self) -> impl Iterator<Item = &MonitoredItem> {
        self.items.iter().filter(|item| item.is_usable())
    }
}

/// Outcome of a successful [`SubscriptionManager::register`].
///
/// Rejected items do not fail the registration; they are listed in `failed`.
#[derive(Debug)]
pub struct RegistrationReport {
    /// Id of the new subscription.
    pub subscription_id: SubscriptionId,

    /// Items that were created.
    pub created: Vec<MonitoredItem>,

    /// One error per rejected item.
    pub failed: Vec<RegistrationError>,
}

impl RegistrationReport {
    /// Returns `true` if every requested item was created.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Counters of one subscription manager.
#[derive(Debug, Default)]
pub struct SubscriptionManagerStats {
    registrations: AtomicU64,
    unregistrations: AtomicU64,
    items_created: AtomicU64,
    items_failed: AtomicU64,
    notifications: AtomicU64,
    teardown_failures: AtomicU64,
}

impl SubscriptionManagerStats {
    /// Returns successful registrations.
    pub fn registrations(&self) -> u64 {
        self.registrations.load(Ordering::Relaxed)
    }

    /// Returns unregistrations that released a subscription.
    pub fn unregistrations(&self) -> u64 {
        self.unregistrations.load(Ordering::Relaxed)
    }

    /// Returns items created with good status.
    pub fn items_created(&self) -> u64 {
        self.items_created.load(Ordering::Relaxed)
    }

    /// Returns items rejected by the server.
    pub fn items_failed(&self) -> u64 {
        self.items_failed.load(Ordering::Relaxed)
    }

    /// Returns publish events forwarded to the dispatcher.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Returns teardown failures that were logged and swallowed.
    pub fn teardown_failures(&self) -> u64 {
        self.teardown_failures.load(Ordering::Relaxed)
    }
}

// =============================================================================
// ItemRouter
// =============================================================================

/// Routes publish events from client handles to their targets.
///
/// One router exists per registration. Closing it on unregister drops late
/// events that were already in flight.
struct ItemRouter {
    targets: RwLock<HashMap<ClientHandle, VariableReference>>,
    dispatcher: Arc<ValueDispatcher>,
    stats: Arc<SubscriptionManagerStats>,
    closed: AtomicBool,
}

impl ItemRouter {
    fn new(dispatcher: Arc<ValueDispatcher>, stats: Arc<SubscriptionManagerStats>) -> Self {
        Self {
            targets: RwLock::new(HashMap::new()),
            dispatcher,
            stats,
            closed: AtomicBool::new(false),
        }
    }

    fn bind(&self, handle: ClientHandle, target: VariableReference) {
        self.targets.write().insert(handle, target);
    }

    fn unbind(&self, handle: ClientHandle) {
        self.targets.write().remove(&handle);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl ValueConsumer for ItemRouter {
    fn on_value(&self, client_handle: ClientHandle, sample: ValueSample) {
        if self.closed.load(Ordering::SeqCst) {
            tracing::trace!(%client_handle, "Publish event after unregister dropped");
            return;
        }

        let targets = self.targets.read();
        let Some(target) = targets.get(&client_handle) else {
            tracing::trace!(%client_handle, "Publish event for unknown item dropped");
            return;
        };

        tracing::debug!(
            %client_handle,
            "subscription value received: item={{{}}}, value={{{}}}",
            target,
            sample.value
        );
        self.stats.notifications.fetch_add(1, Ordering::Relaxed);
        self.dispatcher.dispatch(target, &sample);
    }
}

struct Registration {
    handle: SubscriptionHandle,
    router: Arc<ItemRouter>,
}

// =============================================================================
// SubscriptionManager
// =============================================================================

/// Manages one push subscription over one variable.
///
/// # Examples
///
/// ```rust,ignore
/// let manager = context.subscription(VariableReference::new(2, "X.Y"));
///
/// let report = manager.register().await?;
/// assert!(report.is_complete());
///
/// manager.unregister().await;
/// manager.unregister().await; // no-op
/// ```
pub struct SubscriptionManager<S: ObservationSession> {
    session: Arc<S>,
    target: VariableReference,
    handles: Arc<ClientHandleGenerator>,
    dispatcher: Arc<ValueDispatcher>,
    subscription_settings: SubscriptionSettings,
    item_settings: MonitoredItemSettings,
    teardown_timeout: Duration,
    held: Mutex<Option<Registration>>,
    lifecycle: tokio::sync::Mutex<()>,
    teardown: Mutex<Vec<JoinHandle<()>>>,
    stats: Arc<SubscriptionManagerStats>,
}

impl<S: ObservationSession + 'static> SubscriptionManager<S> {
    /// Creates an unregistered manager with default settings.
    pub fn new(
        session: Arc<S>,
        target: VariableReference,
        handles: Arc<ClientHandleGenerator>,
        dispatcher: Arc<ValueDispatcher>,
    ) -> Self {
        Self {
            session,
            target,
            handles,
            dispatcher,
            subscription_settings: SubscriptionSettings::default(),
            item_settings: MonitoredItemSettings::default(),
            teardown_timeout: DEFAULT_TEARDOWN_TIMEOUT,
            held: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            teardown: Mutex::new(Vec::new()),
            stats: Arc::new(SubscriptionManagerStats::default()),
        }
    }

    /// Sets the subscription settings.
    pub fn with_subscription_settings(mut self, settings: SubscriptionSettings) -> Self {
        self.subscription_settings = settings;
        self
    }

    /// Sets the monitored-item settings.
    pub fn with_item_settings(mut self, settings: MonitoredItemSettings) -> Self {
        self.item_settings = settings;
        self
    }

    /// Sets the bound on the delete request issued by `unregister`.
    pub fn with_teardown_timeout(mut self, timeout: Duration) -> Self {
        self.teardown_timeout = timeout;
        self
    }

    /// Returns the monitored variable.
    pub fn target(&self) -> &VariableReference {
        &self.target
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SubscriptionState {
        if self.held.lock().is_some() {
            SubscriptionState::Registered
        } else {
            SubscriptionState::Unregistered
        }
    }

    /// Returns a copy of the held subscription handle.
    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.held.lock().as_ref().map(|r| r.handle.clone())
    }

    /// Returns the manager's counters.
    pub fn stats(&self) -> &SubscriptionManagerStats {
        &self.stats
    }

    /// Creates the subscription and its monitored item.
    ///
    /// # Errors
    ///
    /// - [`RegistrationError::AlreadyRegistered`] if a subscription is held.
    /// - [`RegistrationError::SubscriptionFailed`] if the server refuses the
    ///   subscription.
    /// - [`RegistrationError::RequestFailed`] if the item-creation call fails;
    ///   the new subscription is deleted again before returning.
    ///
    /// A rejected item is not an error; it is listed in the report.
    pub async fn register(&self) -> OpcUaResult<RegistrationReport> {
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(held) = self.held.lock().as_ref() {
            return Err(OpcUaError::registration(RegistrationError::AlreadyRegistered {
                subscription_id: held.handle.subscription_id.value(),
            }));
        }

        self.subscription_settings.validate()?;
        self.item_settings.validate()?;

        let subscription_id = self
            .session
            .create_subscription(&self.subscription_settings)
            .await
            .map_err(|e| match e {
                OpcUaError::Registration(_) => e,
                other => RegistrationError::subscription_failed(other.to_string()).into(),
            })?;

        tracing::info!(
            subscription_id = %subscription_id,
            publishing_interval_ms = self.subscription_settings.publishing_interval.as_millis() as u64,
            "Subscription created"
        );

        let request = MonitoredItemRequest::value(
            self.handles.next(),
            self.target.clone(),
            &self.item_settings,
        );

        let router = Arc::new(ItemRouter::new(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.stats),
        ));
        router.bind(request.client_handle, request.target.clone());

        let consumer: Arc<dyn ValueConsumer> = router.clone();
        let results = match self
            .session
            .create_monitored_items(subscription_id, std::slice::from_ref(&request), consumer)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                router.close();
                delete_subscription(
                    self.session.as_ref(),
                    subscription_id,
                    self.teardown_timeout,
                    &self.stats,
                )
                .await;
                return Err(OpcUaError::registration(RegistrationError::request_failed(
                    subscription_id.value(),
                    e.to_string(),
                )));
            }
        };

        let mut created = Vec::new();
        let mut failed = Vec::new();
        let mut items = Vec::with_capacity(results.len());

        for item in results.into_iter().map(MonitoredItem::from) {
            if item.is_usable() {
                tracing::info!(
                    subscription_id = %subscription_id,
                    client_handle = %item.client_handle,
                    "item created for nodeId={{{}}}",
                    item.target
                );
                self.stats.items_created.fetch_add(1, Ordering::Relaxed);
                created.push(item.clone());
            } else {
                tracing::warn!(
                    subscription_id = %subscription_id,
                    client_handle = %item.client_handle,
                    "failed to create item for nodeId={{{}}} (status={{{}}})",
                    item.target,
                    item.status_code
                );
                router.unbind(item.client_handle);
                self.stats.items_failed.fetch_add(1, Ordering::Relaxed);
                failed.push(RegistrationError::item_rejected(
                    item.target.to_string(),
                    item.status_code.bits(),
                ));
            }
            items.push(item);
        }

        *self.held.lock() = Some(Registration {
            handle: SubscriptionHandle {
                subscription_id,
                items,
            },
            router,
        });
        self.stats.registrations.fetch_add(1, Ordering::Relaxed);

        Ok(RegistrationReport {
            subscription_id,
            created,
            failed,
        })
    }

    /// Releases the held subscription, if any.
    ///
    /// The held reference is cleared and the item router closed before the
    /// delete is issued, so the manager is unregistered afterwards even if the
    /// server call fails. The delete request is sent from a spawned task and
    /// is not awaited; its failures are logged and counted, never returned.
    /// Returns `true` if a subscription was released.
    pub async fn unregister(&self) -> bool {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(registration) = self.held.lock().take() else {
            tracing::debug!(node_id = %self.target, "Unregister without subscription, nothing to do");
            return false;
        };

        registration.router.close();

        let session = Arc::clone(&self.session);
        let stats = Arc::clone(&self.stats);
        let subscription_id = registration.handle.subscription_id;
        let timeout = self.teardown_timeout;
        let task = tokio::spawn(async move {
            delete_subscription(session.as_ref(), subscription_id, timeout, &stats).await;
        });

        {
            let mut pending = self.teardown.lock();
            pending.retain(|task| !task.is_finished());
            pending.push(task);
        }

        self.stats.unregistrations.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Waits until every delete issued by `unregister` has completed or timed
    /// out.
    pub async fn wait_for_teardown(&self) {
        let pending = std::mem::take(&mut *self.teardown.lock());
        for task in pending {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Subscription delete task aborted");
            }
        }
    }
}

async fn delete_subscription<S: ObservationSession>(
    session: &S,
    subscription_id: SubscriptionId,
    timeout: Duration,
    stats: &SubscriptionManagerStats,
) {
    let outcome = tokio::time::timeout(timeout, session.delete_subscription(subscription_id)).await;

    let error = match outcome {
        Ok(Ok(())) => {
            tracing::info!(subscription_id = %subscription_id, "Subscription deleted");
            return;
        }
        Ok(Err(e)) => TeardownError::delete_failed(subscription_id.value(), e.to_string()),
        Err(_) => TeardownError::timeout("delete_subscription", timeout),
    };

    stats.teardown_failures.fetch_add(1, Ordering::Relaxed);
    OpcUaError::teardown(error).log("unregister");
}

impl<S: ObservationSession + 'static> fmt::Debug for SubscriptionManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionManager")
            .field("target", &self.target)
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::value::OpcUaValue;
    use crate::observe::dispatch::QueueSink;
    use crate::observe::queue::OverflowPolicy;
    use async_trait::async_trait;

    /// Session that accepts everything and keeps the consumer for replay.
    #[derive(Default)]
    struct LoopbackSession {
        next_id: AtomicU64,
        live: Mutex<Vec<SubscriptionId>>,
        consumer: Mutex<Option<(ClientHandle, Arc<dyn ValueConsumer>)>>,
        reject_items: bool,
        fail_delete: bool,
        delete_delay: Option<Duration>,
    }

    impl LoopbackSession {
        fn publish(&self, value: f64) {
            let entry = self.consumer.lock().clone();
            if let Some((handle, consumer)) = entry {
                consumer.on_value(handle, ValueSample::new(value));
            }
        }
    }

    #[async_trait]
    impl ObservationSession for LoopbackSession {
        fn endpoint(&self) -> &str {
            "opc.tcp://host:4840"
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn read_value(&self, _target: &VariableReference) -> OpcUaResult<ValueSample> {
            Ok(ValueSample::new(0.0))
        }

        async fn display_name(&self, target: &VariableReference) -> OpcUaResult<String> {
            Ok(target.identifier().to_string())
        }

        async fn create_subscription(
            &self,
            _settings: &SubscriptionSettings,
        ) -> OpcUaResult<SubscriptionId> {
            let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::SeqCst) as u32 + 1);
            self.live.lock().push(id);
            Ok(id)
        }

        async fn create_monitored_items(
            &self,
            _subscription_id: SubscriptionId,
            requests: &[MonitoredItemRequest],
            consumer: Arc<dyn ValueConsumer>,
        ) -> OpcUaResult<Vec<MonitoredItemResult>> {
            if let Some(first) = requests.first() {
                *self.consumer.lock() = Some((first.client_handle, consumer));
            }
            Ok(requests
                .iter()
                .enumerate()
                .map(|(i, r)| {
                    if self.reject_items {
                        MonitoredItemResult::rejected(r, StatusCode::BAD_NODE_ID_UNKNOWN)
                    } else {
                        MonitoredItemResult::accepted(r, i as u32 + 100)
                    }
                })
                .collect())
        }

        async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()> {
            if let Some(delay) = self.delete_delay {
                tokio::time::sleep(delay).await;
            }
            self.live.lock().retain(|id| *id != subscription_id);
            if self.fail_delete {
                return Err(OpcUaError::not_connected());
            }
            Ok(())
        }

        async fn disconnect(&self) -> OpcUaResult<()> {
            Ok(())
        }
    }

    fn manager(
        session: Arc<LoopbackSession>,
    ) -> (SubscriptionManager<LoopbackSession>, QueueSink) {
        let sink = QueueSink::new(100, OverflowPolicy::DiscardOldest);
        let dispatcher = Arc::new(ValueDispatcher::new().with_sink(Arc::new(sink.clone())));
        let manager = SubscriptionManager::new(
            session,
            VariableReference::new(2, "X.Y"),
            Arc::new(ClientHandleGenerator::new()),
            dispatcher,
        );
        (manager, sink)
    }

    #[tokio::test]
    async fn test_register_then_unregister() {
        let session = Arc::new(LoopbackSession::default());
        let (manager, _sink) = manager(Arc::clone(&session));
        assert_eq!(manager.state(), SubscriptionState::Unregistered);

        let report = manager.register().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.created.len(), 1);
        assert_eq!(report.created[0].client_handle, ClientHandle::new(1));
        assert_eq!(manager.state(), SubscriptionState::Registered);
        assert_eq!(session.live.lock().len(), 1);

        let handle = manager.handle().unwrap();
        assert_eq!(handle.subscription_id, report.subscription_id);
        assert_eq!(handle.usable_items().count(), 1);

        assert!(manager.unregister().await);
        assert_eq!(manager.state(), SubscriptionState::Unregistered);
        manager.wait_for_teardown().await;
        assert!(session.live.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unregister_twice_is_noop() {
        let session = Arc::new(LoopbackSession::default());
        let (manager, _sink) = manager(Arc::clone(&session));

        manager.register().await.unwrap();
        assert!(manager.unregister().await);
        assert!(!manager.unregister().await);
        assert_eq!(manager.stats().unregistrations(), 1);
    }

    #[tokio::test]
    async fn test_unregister_without_register_is_noop() {
        let session = Arc::new(LoopbackSession::default());
        let (manager, _sink) = manager(session);
        assert!(!manager.unregister().await);
    }

    #[tokio::test]
    async fn test_double_register_rejected() {
        let session = Arc::new(LoopbackSession::default());
        let (manager, _sink) = manager(Arc::clone(&session));

        let first = manager.register().await.unwrap();
        let err = manager.register().await.unwrap_err();
        assert!(matches!(
            err,
            OpcUaError::Registration(RegistrationError::AlreadyRegistered { subscription_id })
                if subscription_id == first.subscription_id.value()
        ));
        assert_eq!(session.live.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_values_delivered_in_order() {
        let session = Arc::new(LoopbackSession::default());
        let (manager, sink) = manager(Arc::clone(&session));
        manager.register().await.unwrap();

        session.publish(1.0);
        session.publish(2.0);
        session.publish(3.0);

        let values: Vec<_> = sink.queue().drain().into_iter().map(|(_, s)| s.value).collect();
        assert_eq!(
            values,
            vec![
                OpcUaValue::Double(1.0),
                OpcUaValue::Double(2.0),
                OpcUaValue::Double(3.0)
            ]
        );
        assert_eq!(manager.stats().notifications(), 3);
    }

    #[tokio::test]
    async fn test_late_values_after_unregister_dropped() {
        let session = Arc::new(LoopbackSession::default());
        let (manager, sink) = manager(Arc::clone(&session));
        manager.register().await.unwrap();
        manager.unregister().await;

        session.publish(9.0);
        assert!(sink.queue().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_item_reported_not_fatal() {
        let session = Arc::new(LoopbackSession {
            reject_items: true,
            ..Default::default()
        });
        let (manager, sink) = manager(Arc::clone(&session));

        let report = manager.register().await.unwrap();
        assert!(!report.is_complete());
        assert!(report.created.is_empty());
        assert!(matches!(
            report.failed[0],
            RegistrationError::ItemRejected { status_code, .. }
                if status_code == StatusCode::BAD_NODE_ID_UNKNOWN.bits()
        ));
        assert_eq!(manager.state(), SubscriptionState::Registered);
        assert_eq!(manager.stats().items_failed(), 1);

        session.publish(1.0);
        assert!(sink.queue().is_empty());
    }

    #[tokio::test]
    async fn test_teardown_failure_still_clears() {
        let session = Arc::new(LoopbackSession {
            fail_delete: true,
            ..Default::default()
        });
        let (manager, _sink) = manager(Arc::clone(&session));

        manager.register().await.unwrap();
        assert!(manager.unregister().await);
        assert_eq!(manager.state(), SubscriptionState::Unregistered);
        manager.wait_for_teardown().await;
        assert_eq!(manager.stats().teardown_failures(), 1);
        assert!(!manager.unregister().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unregister_does_not_wait_for_delete() {
        let session = Arc::new(LoopbackSession {
            delete_delay: Some(Duration::from_secs(3)),
            ..Default::default()
        });
        let (manager, _sink) = manager(Arc::clone(&session));
        manager.register().await.unwrap();

        let started = tokio::time::Instant::now();
        assert!(manager.unregister().await);
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(manager.state(), SubscriptionState::Unregistered);
        assert_eq!(session.live.lock().len(), 1);

        manager.wait_for_teardown().await;
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert!(session.live.lock().is_empty());
        assert_eq!(manager.stats().teardown_failures(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_delete_times_out_in_background() {
        let session = Arc::new(LoopbackSession {
            delete_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let (manager, _sink) = manager(Arc::clone(&session));
        let manager = manager.with_teardown_timeout(Duration::from_secs(1));
        manager.register().await.unwrap();

        assert!(manager.unregister().await);
        assert_eq!(manager.stats().teardown_failures(), 0);

        manager.wait_for_teardown().await;
        assert_eq!(manager.stats().teardown_failures(), 1);
    }
}

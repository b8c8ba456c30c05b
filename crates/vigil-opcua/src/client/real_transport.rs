// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session provider backed by the `opcua` crate.
//!
//! The `opcua` 0.12 client API is blocking, so every service call runs on
//! tokio's blocking pool, bounded by the configured request timeout. The
//! session's publish loop runs on its own thread from the moment the session
//! is established until it is disconnected.
//!
//! # Example
//!
//! ```rust,ignore
//! use vigil_opcua::client::RealSessionProvider;
//! use vigil_opcua::observe::{ObservationContext, ValueDispatcher};
//! use vigil_opcua::types::OpcUaConfig;
//!
//! let config = OpcUaConfig::new("opc.tcp://localhost:4840");
//! let context =
//!     ObservationContext::connect(&RealSessionProvider::new(), &config, Arc::default()).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinError;

use opcua::client::prelude::*;
use opcua::sync::RwLock as OpcUaRwLock;

use crate::client::transport::{
    MonitoredItemRequest, MonitoredItemResult, ObservationSession, SessionProvider,
    SubscriptionId, ValueConsumer,
};
use crate::client::value::{OpcUaValue, StatusCode as VigilStatusCode, ValueSample};
use crate::error::{
    ConnectionError, OpcUaError, OpcUaResult, ReadError, RegistrationError, TeardownError,
};
use crate::observe::handle::ClientHandle;
use crate::types::{
    AttributeId as VigilAttributeId, MonitoringMode as VigilMonitoringMode, OpcUaConfig,
    SubscriptionSettings, VariableReference,
};

type SharedSession = Arc<OpcUaRwLock<Session>>;

// =============================================================================
// RealSessionProvider
// =============================================================================

/// Connects to real servers over `opc.tcp`.
///
/// Discovers the endpoints of the configured URL and picks the first one
/// without security. Sessions are anonymous.
#[derive(Debug, Default, Clone)]
pub struct RealSessionProvider;

impl RealSessionProvider {
    /// Creates a new provider.
    pub fn new() -> Self {
        Self
    }

    fn build_client(config: &OpcUaConfig) -> OpcUaResult<Client> {
        ClientBuilder::new()
            .application_name(&config.application_name)
            .application_uri(&config.effective_application_uri())
            .product_uri(&config.effective_application_uri())
            .create_sample_keypair(true)
            .trust_server_certs(true)
            .session_retry_limit(0)
            .session_timeout(config.session_timeout.as_millis() as u32)
            .client()
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::invalid_endpoint(
                    &config.endpoint,
                    "Failed to build OPC UA client",
                ))
            })
    }

    fn connect_blocking(config: &OpcUaConfig) -> OpcUaResult<SharedSession> {
        let mut client = Self::build_client(config)?;

        let endpoints = client
            .get_server_endpoints_from_url(config.endpoint.as_str())
            .map_err(|e| {
                OpcUaError::connection(ConnectionError::endpoint_not_found(format!(
                    "{}: {}",
                    config.endpoint, e
                )))
            })?;

        let none_uri = SecurityPolicy::None.to_uri();
        let endpoint = endpoints
            .into_iter()
            .find(|e| {
                e.security_policy_uri.as_ref() == none_uri
                    && e.security_mode == MessageSecurityMode::None
            })
            .ok_or_else(|| {
                OpcUaError::connection(ConnectionError::no_suitable_endpoint("None/None"))
            })?;

        tracing::debug!(
            endpoint_url = %endpoint.endpoint_url,
            security_policy = %endpoint.security_policy_uri,
            "Found endpoint without security"
        );

        client
            .connect_to_endpoint(endpoint, IdentityToken::Anonymous)
            .map_err(|_| OpcUaError::connection(ConnectionError::refused(&config.endpoint)))
    }
}

#[async_trait]
impl SessionProvider for RealSessionProvider {
    type Session = RealSession;

    async fn connect(&self, config: &OpcUaConfig) -> OpcUaResult<RealSession> {
        let owned = config.clone();
        let connect = tokio::task::spawn_blocking(move || Self::connect_blocking(&owned));

        let session = match tokio::time::timeout(config.connect_timeout, connect).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(ConnectionError::session_failed(e.to_string()).into());
            }
            Err(_) => {
                return Err(
                    ConnectionError::timed_out(&config.endpoint, config.connect_timeout).into(),
                );
            }
        };

        let publish_loop = Session::run_async(Arc::clone(&session));

        Ok(RealSession {
            endpoint: config.endpoint.clone(),
            request_timeout: config.request_timeout,
            session,
            publish_loop: Mutex::new(Some(publish_loop)),
            routes: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
        })
    }
}

// =============================================================================
// RealSession
// =============================================================================

/// Delivery slot shared between a subscription's data-change callback and the
/// session. Filled by `create_monitored_items` before the server is asked to
/// create the items.
///
/// `opcua` keeps a rolling history of values per item, so the route remembers
/// the newest value it forwarded for each client handle.
#[derive(Default)]
struct Route {
    consumer: Option<Arc<dyn ValueConsumer>>,
    handles: HashMap<u32, ClientHandle>,
    delivered: HashMap<u32, DataValue>,
}

type SharedRoute = Arc<RwLock<Route>>;

/// A connected `opcua` session.
pub struct RealSession {
    endpoint: String,
    request_timeout: Duration,
    session: SharedSession,
    publish_loop: Mutex<Option<tokio::sync::oneshot::Sender<SessionCommand>>>,
    routes: RwLock<HashMap<u32, SharedRoute>>,
    connected: AtomicBool,
}

impl RealSession {
    /// Runs a service call on the blocking pool, giving up after the request
    /// timeout. An abandoned call keeps its blocking thread until `opcua`
    /// returns.
    async fn blocking<T, F, E>(&self, f: F, on_timeout: E) -> OpcUaResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Session) -> OpcUaResult<T> + Send + 'static,
        E: FnOnce(Duration) -> OpcUaError,
    {
        if !self.is_connected() {
            return Err(OpcUaError::not_connected());
        }

        let session = Arc::clone(&self.session);
        let call = tokio::task::spawn_blocking(move || {
            let guard = session.read();
            f(&guard)
        });

        bounded(self.request_timeout, call, on_timeout).await
    }

    fn node_id(target: &VariableReference) -> NodeId {
        NodeId::new(target.namespace_index(), target.identifier().to_string())
    }

    fn read_value_id(target: &VariableReference, attribute: VigilAttributeId) -> ReadValueId {
        ReadValueId {
            node_id: Self::node_id(target),
            attribute_id: attribute.value(),
            index_range: UAString::null(),
            data_encoding: QualifiedName::null(),
        }
    }

    fn monitoring_mode(mode: VigilMonitoringMode) -> MonitoringMode {
        match mode {
            VigilMonitoringMode::Disabled => MonitoringMode::Disabled,
            VigilMonitoringMode::Sampling => MonitoringMode::Sampling,
            VigilMonitoringMode::Reporting => MonitoringMode::Reporting,
        }
    }
}

#[async_trait]
impl ObservationSession for RealSession {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn read_value(&self, target: &VariableReference) -> OpcUaResult<ValueSample> {
        let node = target.to_string();
        let request = Self::read_value_id(target, VigilAttributeId::Value);

        tracing::trace!(node_id = %node, "Reading node value");

        let timed_out = node.clone();
        self.blocking(
            move |session| {
                let results = session
                    .read(&[request], TimestampsToReturn::Both, 0.0)
                    .map_err(|e| ReadError::failed(&node, format!("Read failed: {e}")))?;

                results
                    .first()
                    .map(sample_from_data_value)
                    .ok_or_else(|| ReadError::failed(&node, "Empty read response").into())
            },
            |limit| ReadError::timeout(timed_out, limit).into(),
        )
        .await
    }

    async fn display_name(&self, target: &VariableReference) -> OpcUaResult<String> {
        let node = target.to_string();
        let request = Self::read_value_id(target, VigilAttributeId::DisplayName);

        let timed_out = node.clone();
        self.blocking(
            move |session| {
                let results = session
                    .read(&[request], TimestampsToReturn::Neither, 0.0)
                    .map_err(|e| {
                        ReadError::failed(&node, format!("Display name read failed: {e}"))
                    })?;

                match results.first().and_then(|dv| dv.value.as_ref()) {
                    Some(Variant::LocalizedText(text)) => Ok(text.text.as_ref().to_string()),
                    Some(other) => Ok(format!("{other:?}")),
                    None => Err(ReadError::node_not_found(&node).into()),
                }
            },
            |limit| ReadError::timeout(timed_out, limit).into(),
        )
        .await
    }

    async fn create_subscription(
        &self,
        settings: &SubscriptionSettings,
    ) -> OpcUaResult<SubscriptionId> {
        let route: SharedRoute = Arc::default();
        let callback_route = Arc::clone(&route);
        let settings = settings.clone();

        let server_id = self
            .blocking(
                move |session| {
                    session
                        .create_subscription(
                            settings.publishing_interval.as_millis() as f64,
                            settings.lifetime_count,
                            settings.keepalive_count,
                            settings.max_notifications_per_publish,
                            settings.priority,
                            settings.publishing_enabled,
                            DataChangeCallback::new(move |items| deliver(&callback_route, items)),
                        )
                        .map_err(|e| RegistrationError::subscription_failed(e.to_string()).into())
                },
                |limit| {
                    RegistrationError::subscription_failed(format!("timed out after {limit:?}"))
                        .into()
                },
            )
            .await?;

        self.routes.write().insert(server_id, route);
        Ok(SubscriptionId::new(server_id))
    }

    async fn create_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        requests: &[MonitoredItemRequest],
        consumer: Arc<dyn ValueConsumer>,
    ) -> OpcUaResult<Vec<MonitoredItemResult>> {
        let route = self
            .routes
            .read()
            .get(&subscription_id.value())
            .cloned()
            .ok_or_else(|| {
                RegistrationError::request_failed(subscription_id.value(), "Unknown subscription")
            })?;

        {
            let mut route = route.write();
            route.consumer = Some(consumer);
            for request in requests {
                route
                    .handles
                    .insert(request.client_handle.value(), request.client_handle);
            }
        }

        let items: Vec<MonitoredItemCreateRequest> = requests
            .iter()
            .map(|request| MonitoredItemCreateRequest {
                item_to_monitor: Self::read_value_id(&request.target, request.attribute),
                monitoring_mode: Self::monitoring_mode(request.monitoring_mode),
                requested_parameters: MonitoringParameters {
                    client_handle: request.client_handle.value(),
                    sampling_interval: request.sampling_interval.as_millis() as f64,
                    filter: ExtensionObject::null(),
                    queue_size: request.queue_size,
                    discard_oldest: request.discard_oldest,
                },
            })
            .collect();

        let id = subscription_id.value();
        let results = self
            .blocking(
                move |session| {
                    session
                        .create_monitored_items(id, TimestampsToReturn::Both, &items)
                        .map_err(|e| RegistrationError::request_failed(id, e.to_string()).into())
                },
                |limit| {
                    RegistrationError::request_failed(id, format!("timed out after {limit:?}"))
                        .into()
                },
            )
            .await?;

        Ok(requests
            .iter()
            .zip(results.iter())
            .map(|(request, result)| {
                let status = VigilStatusCode::new(result.status_code.bits());
                if status.is_good() {
                    let mut accepted =
                        MonitoredItemResult::accepted(request, result.monitored_item_id);
                    accepted.revised_queue_size = result.revised_queue_size;
                    accepted
                } else {
                    MonitoredItemResult::rejected(request, status)
                }
            })
            .collect())
    }

    async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()> {
        if let Some(route) = self.routes.write().remove(&subscription_id.value()) {
            route.write().consumer = None;
        }

        let id = subscription_id.value();
        self.blocking(
            move |session| {
                session
                    .delete_subscription(id)
                    .map(|_| ())
                    .map_err(|e| TeardownError::delete_failed(id, e.to_string()).into())
            },
            |limit| TeardownError::timeout("delete_subscription", limit).into(),
        )
        .await
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(stop) = self.publish_loop.lock().take() {
            let _ = stop.send(SessionCommand::Stop);
        }
        self.routes.write().clear();

        let session = Arc::clone(&self.session);
        let call = tokio::task::spawn_blocking(move || {
            session.read().disconnect();
            Ok::<(), OpcUaError>(())
        });
        bounded(self.request_timeout, call, |limit| {
            TeardownError::timeout("disconnect", limit).into()
        })
        .await
    }
}

impl std::fmt::Debug for RealSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealSession")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Awaits a blocking-pool call for at most `limit`.
async fn bounded<T, C, E>(limit: Duration, call: C, on_timeout: E) -> OpcUaResult<T>
where
    C: Future<Output = Result<OpcUaResult<T>, JoinError>>,
    E: FnOnce(Duration) -> OpcUaError,
{
    match tokio::time::timeout(limit, call).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => Err(ConnectionError::session_failed(e.to_string()).into()),
        Err(_) => Err(on_timeout(limit)),
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Forwards every value that arrived for `items` since the previous callback,
/// oldest first. The consumer runs after the route lock is released.
fn deliver(route: &SharedRoute, items: &[&MonitoredItem]) {
    let mut pending = Vec::new();
    let consumer = {
        let mut guard = route.write();
        let Route {
            consumer,
            handles,
            delivered,
        } = &mut *guard;
        let Some(consumer) = consumer.clone() else {
            return;
        };

        for item in items {
            let Some(handle) = handles.get(&item.client_handle()).copied() else {
                tracing::trace!(
                    client_handle = item.client_handle(),
                    "Data change for untracked item dropped"
                );
                continue;
            };

            let fresh = undelivered(item.values(), delivered.get(&item.client_handle()));
            if let Some(newest) = fresh.last() {
                delivered.insert(item.client_handle(), (*newest).clone());
            }
            pending.extend(
                fresh
                    .into_iter()
                    .map(|value| (handle, sample_from_data_value(value))),
            );
        }
        consumer
    };

    for (handle, sample) in pending {
        consumer.on_value(handle, sample);
    }
}

/// Returns the values queued after `last`. When `last` is absent or has been
/// evicted from the history every queued value is new.
fn undelivered<'a, I>(history: I, last: Option<&DataValue>) -> Vec<&'a DataValue>
where
    I: IntoIterator<Item = &'a DataValue>,
{
    let mut values: Vec<&DataValue> = history.into_iter().collect();
    let start = last
        .and_then(|last| values.iter().rposition(|value| *value == last))
        .map_or(0, |position| position + 1);
    values.split_off(start)
}

// =============================================================================
// Conversion
// =============================================================================

fn sample_from_data_value(data_value: &DataValue) -> ValueSample {
    let value = data_value
        .value
        .as_ref()
        .map(value_from_variant)
        .unwrap_or_default();
    let status = data_value
        .status
        .as_ref()
        .map(|s| VigilStatusCode::new(s.bits()))
        .unwrap_or(VigilStatusCode::GOOD);

    let mut sample = ValueSample::new(value).with_status(status);
    if let Some(ts) = data_value.source_timestamp.as_ref().and_then(to_chrono) {
        sample = sample.with_source_timestamp(ts);
    }
    if let Some(ts) = data_value.server_timestamp.as_ref().and_then(to_chrono) {
        sample = sample.with_server_timestamp(ts);
    }
    sample
}

fn to_chrono(timestamp: &opcua::types::DateTime) -> Option<DateTime<Utc>> {
    let t = timestamp.as_chrono();
    DateTime::from_timestamp(t.timestamp(), t.timestamp_subsec_nanos())
}

fn value_from_variant(variant: &Variant) -> OpcUaValue {
    match variant {
        Variant::Empty => OpcUaValue::Null,
        Variant::Boolean(v) => OpcUaValue::Boolean(*v),
        Variant::SByte(v) => OpcUaValue::SByte(*v),
        Variant::Byte(v) => OpcUaValue::Byte(*v),
        Variant::Int16(v) => OpcUaValue::Int16(*v),
        Variant::UInt16(v) => OpcUaValue::UInt16(*v),
        Variant::Int32(v) => OpcUaValue::Int32(*v),
        Variant::UInt32(v) => OpcUaValue::UInt32(*v),
        Variant::Int64(v) => OpcUaValue::Int64(*v),
        Variant::UInt64(v) => OpcUaValue::UInt64(*v),
        Variant::Float(v) => OpcUaValue::Float(*v),
        Variant::Double(v) => OpcUaValue::Double(*v),
        Variant::String(v) => OpcUaValue::String(v.as_ref().to_string()),
        Variant::DateTime(v) => to_chrono(v)
            .map(OpcUaValue::DateTime)
            .unwrap_or(OpcUaValue::Null),
        Variant::ByteString(v) => OpcUaValue::ByteString(v.value.clone().unwrap_or_default()),
        Variant::LocalizedText(v) => OpcUaValue::String(v.text.as_ref().to_string()),
        Variant::Array(arr) => {
            OpcUaValue::Array(arr.values.iter().map(value_from_variant).collect())
        }
        other => OpcUaValue::String(format!("{other:?}")),
    }
}

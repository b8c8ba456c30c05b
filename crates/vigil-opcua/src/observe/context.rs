// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session-scoped observation context.
//!
//! An [`ObservationContext`] is created by connecting through a
//! [`SessionProvider`]. Every poll task and subscription manager it hands out
//! shares its session, its handle generator and its dispatcher.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::client::transport::{ObservationSession, SessionProvider};
use crate::error::{OpcUaError, OpcUaResult, TeardownError};
use crate::observe::dispatch::ValueDispatcher;
use crate::observe::handle::ClientHandleGenerator;
use crate::observe::poll::{PollExit, PollScheduler, PollTask, PollTaskId};
use crate::observe::subscription::SubscriptionManager;
use crate::types::{OpcUaConfig, PollSettings, VariableReference};

/// Default bound on the disconnect request issued by [`ObservationContext::close`].
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns one session and everything observing through it.
pub struct ObservationContext<S: ObservationSession> {
    session: Arc<S>,
    handles: Arc<ClientHandleGenerator>,
    dispatcher: Arc<ValueDispatcher>,
    scheduler: PollScheduler,
    disconnect_timeout: Duration,
}

impl<S: ObservationSession + 'static> ObservationContext<S> {
    /// Connects through `provider` and builds a context around the session.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid, or the
    /// provider's connection error.
    pub async fn connect<P>(
        provider: &P,
        config: &OpcUaConfig,
        dispatcher: Arc<ValueDispatcher>,
    ) -> OpcUaResult<Self>
    where
        P: SessionProvider<Session = S>,
    {
        config.validate()?;

        tracing::info!(
            endpoint = %config.endpoint,
            application_name = %config.application_name,
            "Connecting to OPC UA server"
        );

        let session = match provider.connect(config).await {
            Ok(session) => session,
            Err(e) => {
                e.log("connect");
                return Err(e);
            }
        };

        tracing::info!(endpoint = %session.endpoint(), "Session established");
        Ok(Self::with_session(Arc::new(session), dispatcher))
    }

    /// Builds a context around an already connected session.
    pub fn with_session(session: Arc<S>, dispatcher: Arc<ValueDispatcher>) -> Self {
        Self {
            session,
            handles: Arc::new(ClientHandleGenerator::new()),
            scheduler: PollScheduler::new(Arc::clone(&dispatcher)),
            dispatcher,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
        }
    }

    /// Sets the bound on the disconnect request.
    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Returns the shared session.
    pub fn session(&self) -> &Arc<S> {
        &self.session
    }

    /// Returns the handle generator shared by every subscription.
    pub fn handles(&self) -> &Arc<ClientHandleGenerator> {
        &self.handles
    }

    /// Returns the dispatcher every observation delivers to.
    pub fn dispatcher(&self) -> &Arc<ValueDispatcher> {
        &self.dispatcher
    }

    /// Returns the poll scheduler.
    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    /// Starts polling `target`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `settings` is invalid.
    pub fn schedule_poll(
        &self,
        target: VariableReference,
        settings: PollSettings,
    ) -> OpcUaResult<PollTaskId> {
        let task = PollTask::new(Arc::clone(&self.session), target, settings)?;
        Ok(self.scheduler.schedule(task))
    }

    /// Stops a poll task and waits for its in-flight tick.
    pub async fn remove_poll(&self, id: PollTaskId) -> Option<PollExit> {
        self.scheduler.remove(id).await
    }

    /// Returns an unregistered subscription manager for `target`.
    pub fn subscription(&self, target: VariableReference) -> SubscriptionManager<S> {
        SubscriptionManager::new(
            Arc::clone(&self.session),
            target,
            Arc::clone(&self.handles),
            Arc::clone(&self.dispatcher),
        )
    }

    /// Stops every poll task, then disconnects.
    ///
    /// Subscriptions are not tracked here; unregister them before closing.
    /// Disconnect failures are logged and swallowed.
    pub async fn close(self) -> Vec<(PollTaskId, PollExit)> {
        let exits = self.scheduler.shutdown().await;

        let outcome =
            tokio::time::timeout(self.disconnect_timeout, self.session.disconnect()).await;
        match outcome {
            Ok(Ok(())) => {
                tracing::info!(endpoint = %self.session.endpoint(), "Disconnected");
            }
            Ok(Err(e)) => {
                OpcUaError::teardown(TeardownError::disconnect_failed(e.to_string()))
                    .log("close");
            }
            Err(_) => {
                OpcUaError::teardown(TeardownError::timeout("disconnect", self.disconnect_timeout))
                    .log("close");
            }
        }

        exits
    }
}

impl<S: ObservationSession> fmt::Debug for ObservationContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationContext")
            .field("endpoint", &self.session.endpoint())
            .field("poll_tasks", &self.scheduler.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::transport::{
        MonitoredItemRequest, MonitoredItemResult, SubscriptionId, ValueConsumer,
    };
    use crate::client::value::ValueSample;
    use crate::error::ConnectionError;
    use crate::types::SubscriptionSettings;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct StubSession {
        disconnected: AtomicBool,
    }

    #[async_trait]
    impl ObservationSession for StubSession {
        fn endpoint(&self) -> &str {
            "opc.tcp://host:4840"
        }

        fn is_connected(&self) -> bool {
            !self.disconnected.load(Ordering::SeqCst)
        }

        async fn read_value(&self, _target: &VariableReference) -> OpcUaResult<ValueSample> {
            Ok(ValueSample::new(1.0))
        }

        async fn display_name(&self, target: &VariableReference) -> OpcUaResult<String> {
            Ok(target.identifier().to_string())
        }

        async fn create_subscription(
            &self,
            _settings: &SubscriptionSettings,
        ) -> OpcUaResult<SubscriptionId> {
            Ok(SubscriptionId::new(1))
        }

        async fn create_monitored_items(
            &self,
            _subscription_id: SubscriptionId,
            requests: &[MonitoredItemRequest],
            _consumer: Arc<dyn ValueConsumer>,
        ) -> OpcUaResult<Vec<MonitoredItemResult>> {
            Ok(requests
                .iter()
                .map(|r| MonitoredItemResult::accepted(r, 1))
                .collect())
        }

        async fn delete_subscription(&self, _subscription_id: SubscriptionId) -> OpcUaResult<()> {
            Ok(())
        }

        async fn disconnect(&self) -> OpcUaResult<()> {
            self.disconnected.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubProvider {
        refuse: bool,
    }

    #[async_trait]
    impl SessionProvider for StubProvider {
        type Session = StubSession;

        async fn connect(&self, config: &OpcUaConfig) -> OpcUaResult<StubSession> {
            if self.refuse {
                return Err(ConnectionError::refused(&config.endpoint).into());
            }
            Ok(StubSession::default())
        }
    }

    #[tokio::test]
    async fn test_connect_and_close() {
        let provider = StubProvider { refuse: false };
        let config = OpcUaConfig::new("opc.tcp://host:4840");
        let context = ObservationContext::connect(&provider, &config, Arc::default())
            .await
            .unwrap();

        let session = Arc::clone(context.session());
        assert!(session.is_connected());

        context.close().await;
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let provider = StubProvider { refuse: true };
        let config = OpcUaConfig::new("opc.tcp://host:4840");
        let err = ObservationContext::connect(&provider, &config, Arc::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OpcUaError::Connection(ConnectionError::Refused { .. })));
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let provider = StubProvider { refuse: false };
        let config = OpcUaConfig::new("http://host:4840");
        let err = ObservationContext::connect(&provider, &config, Arc::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OpcUaError::Configuration(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_polls() {
        let context = ObservationContext::with_session(
            Arc::new(StubSession::default()),
            Arc::new(ValueDispatcher::new()),
        );
        let id = context
            .schedule_poll(VariableReference::new(2, "X.Y"), PollSettings::default())
            .unwrap();
        assert!(context.scheduler().is_running(id));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        let exits = context.close().await;
        assert_eq!(exits.len(), 1);
        assert!(!exits[0].1.is_failed());
        assert!(exits[0].1.ticks() >= 1);
    }

    #[tokio::test]
    async fn test_subscriptions_share_handle_generator() {
        let context = ObservationContext::with_session(
            Arc::new(StubSession::default()),
            Arc::new(ValueDispatcher::new()),
        );
        let first = context.subscription(VariableReference::new(2, "A"));
        let second = context.subscription(VariableReference::new(2, "B"));

        let a = first.register().await.unwrap();
        let b = second.register().await.unwrap();
        assert_ne!(a.created[0].client_handle, b.created[0].client_handle);
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value dispatch.
//!
//! Both observation strategies hand every sample to a [`ValueDispatcher`],
//! which forwards it to each registered [`ValueSink`] in registration order.
//! The dispatcher adds no buffering; ordering is whatever the producing poll
//! task or subscription delivered.
//!
//! Dispatch may run on the session's notification path, so sinks must return
//! quickly. Sinks that feed slow consumers hand off through a channel
//! ([`ChannelSink`]) or a bounded queue ([`QueueSink`]).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::client::value::ValueSample;
use crate::observe::queue::{OverflowPolicy, SampleQueue};
use crate::types::VariableReference;

/// A sample together with the variable it was observed on.
pub type Observation = (VariableReference, ValueSample);

// =============================================================================
// ValueSink
// =============================================================================

/// Consumer of observed values.
pub trait ValueSink: Send + Sync {
    /// Receives one sample for `reference`. Must not block.
    fn notify(&self, reference: &VariableReference, sample: &ValueSample);
}

// =============================================================================
// TracingSink
// =============================================================================

/// Writes every sample as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

impl ValueSink for TracingSink {
    fn notify(&self, reference: &VariableReference, sample: &ValueSample) {
        tracing::info!(
            node_id = %reference,
            value = %sample.value,
            status = %sample.status_code,
            source_timestamp = ?sample.source_timestamp,
            "Value observed"
        );
    }
}

// =============================================================================
// ChannelSink
// =============================================================================

/// Forwards samples into a bounded tokio channel.
///
/// Uses `try_send`, so a full or closed channel drops the sample and counts it
/// instead of stalling the caller.
#[derive(Debug)]
pub struct ChannelSink {
    sender: mpsc::Sender<Observation>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Creates a sink over an existing sender.
    pub fn new(sender: mpsc::Sender<Observation>) -> Self {
        Self {
            sender,
            dropped: AtomicU64::new(0),
        }
    }

    /// Creates a sink together with its receiver.
    pub fn with_channel(capacity: usize) -> (Self, mpsc::Receiver<Observation>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Returns how many samples were dropped.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl ValueSink for ChannelSink {
    fn notify(&self, reference: &VariableReference, sample: &ValueSample) {
        if self
            .sender
            .try_send((reference.clone(), sample.clone()))
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(node_id = %reference, "Channel sink full or closed, sample dropped");
        }
    }
}

// =============================================================================
// QueueSink
// =============================================================================

/// Buffers samples in a bounded [`SampleQueue`].
///
/// With [`OverflowPolicy::DiscardOldest`] a consumer that falls behind always
/// finds the most recent samples.
#[derive(Debug, Clone)]
pub struct QueueSink {
    queue: Arc<SampleQueue<Observation>>,
}

impl QueueSink {
    /// Creates a sink with its own queue.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            queue: Arc::new(SampleQueue::new(capacity, policy)),
        }
    }

    /// Returns the queue consumers read from.
    pub fn queue(&self) -> Arc<SampleQueue<Observation>> {
        Arc::clone(&self.queue)
    }
}

impl ValueSink for QueueSink {
    fn notify(&self, reference: &VariableReference, sample: &ValueSample) {
        if let Some((dropped, _)) = self.queue.push((reference.clone(), sample.clone())) {
            tracing::trace!(node_id = %dropped, "Queue sink overflow, sample discarded");
        }
    }
}

// =============================================================================
// ValueDispatcher
// =============================================================================

/// Fans samples out to the registered sinks.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use vigil_opcua::client::ValueSample;
/// use vigil_opcua::observe::{QueueSink, OverflowPolicy, ValueDispatcher};
/// use vigil_opcua::types::VariableReference;
///
/// let sink = QueueSink::new(10, OverflowPolicy::DiscardOldest);
/// let queue = sink.queue();
///
/// let dispatcher = ValueDispatcher::new().with_sink(Arc::new(sink));
/// dispatcher.dispatch(&VariableReference::new(2, "X.Y"), &ValueSample::new(42.0));
///
/// assert_eq!(queue.len(), 1);
/// assert_eq!(dispatcher.dispatched(), 1);
/// ```
#[derive(Default)]
pub struct ValueDispatcher {
    sinks: RwLock<Vec<Arc<dyn ValueSink>>>,
    dispatched: AtomicU64,
}

impl ValueDispatcher {
    /// Creates a dispatcher with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink, builder style.
    pub fn with_sink(self, sink: Arc<dyn ValueSink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Adds a sink.
    pub fn add_sink(&self, sink: Arc<dyn ValueSink>) {
        self.sinks.write().push(sink);
    }

    /// Returns the number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Delivers one sample to every sink.
    pub fn dispatch(&self, reference: &VariableReference, sample: &ValueSample) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        for sink in self.sinks.read().iter() {
            sink.notify(reference, sample);
        }
    }

    /// Returns how many samples have been dispatched.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

impl ValueSink for ValueDispatcher {
    fn notify(&self, reference: &VariableReference, sample: &ValueSample) {
        self.dispatch(reference, sample);
    }
}

impl std::fmt::Debug for ValueDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueDispatcher")
            .field("sinks", &self.sink_count())
            .field("dispatched", &self.dispatched())
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

    fn target() -> VariableReference {
        VariableReference::new(2, "X.Y")
    }

    #[test]
    fn test_dispatch_reaches_every_sink_in_order() {
        let first = QueueSink::new(10, OverflowPolicy::DiscardOldest);
        let second = QueueSink::new(10, OverflowPolicy::DiscardOldest);
        let (q1, q2) = (first.queue(), second.queue());

        let dispatcher = ValueDispatcher::new()
            .with_sink(Arc::new(first))
            .with_sink(Arc::new(second));
        assert_eq!(dispatcher.sink_count(), 2);

        for v in [1.0, 2.0, 3.0] {
            dispatcher.dispatch(&target(), &ValueSample::new(v));
        }

        for queue in [q1, q2] {
            let values: Vec<_> = queue.drain().into_iter().map(|(_, s)| s.value).collect();
            assert_eq!(
                values,
                vec![
                    OpcUaValue::Double(1.0),
                    OpcUaValue::Double(2.0),
                    OpcUaValue::Double(3.0)
                ]
            );
        }
        assert_eq!(dispatcher.dispatched(), 3);
    }

    #[test]
    fn test_dispatch_without_sinks_is_counted() {
        let dispatcher = ValueDispatcher::new();
        dispatcher.dispatch(&target(), &ValueSample::new(1.0));
        assert_eq!(dispatcher.dispatched(), 1);
    }

    #[tokio::test]
    async fn test_channel_sink_counts_drops() {
        let (sink, mut rx) = ChannelSink::with_channel(1);
        sink.notify(&target(), &ValueSample::new(1.0));
        sink.notify(&target(), &ValueSample::new(2.0));

        assert_eq!(sink.dropped(), 1);
        let (reference, sample) = rx.recv().await.unwrap();
        assert_eq!(reference, target());
        assert_eq!(sample.value, OpcUaValue::Double(1.0));
    }

    #[test]
    fn test_queue_sink_discards_oldest() {
        let sink = QueueSink::new(10, OverflowPolicy::DiscardOldest);
        let queue = sink.queue();

        for i in 1..=11 {
            sink.notify(&target(), &ValueSample::new(OpcUaValue::Int32(i)));
        }

        let kept: Vec<_> = queue.drain().into_iter().map(|(_, s)| s.value).collect();
        assert_eq!(kept.len(), 10);
        assert_eq!(kept.first(), Some(&OpcUaValue::Int32(2)));
        assert_eq!(kept.last(), Some(&OpcUaValue::Int32(11)));
        assert_eq!(queue.discarded(), 1);
    }

    #[test]
    fn test_dispatcher_is_a_sink() {
        let sink = QueueSink::new(4, OverflowPolicy::DiscardOldest);
        let queue = sink.queue();
        let inner = ValueDispatcher::new().with_sink(Arc::new(sink));
        let outer = ValueDispatcher::new().with_sink(Arc::new(inner));

        outer.notify(&target(), &ValueSample::new(5.0));
        assert_eq!(queue.len(), 1);
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded sample queue with a configurable overflow policy.
//!
//! Monitored items buffer at most `queue_size` values; when the buffer is full
//! the overflow policy decides which value is lost. The same queue backs
//! [`QueueSink`](crate::observe::dispatch::QueueSink), which gives slow
//! consumers a buffer that never blocks the notification path.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Default queue capacity, matching the monitored-item queue size.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

// =============================================================================
// OverflowPolicy
// =============================================================================

/// What to drop when a full queue receives another value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest buffered value to admit the newest.
    #[default]
    DiscardOldest,
    /// Keep the buffered values and drop the incoming one.
    DiscardNewest,
}

impl OverflowPolicy {
    /// Maps the OPC UA `discardOldest` flag to a policy.
    pub fn from_discard_oldest(discard_oldest: bool) -> Self {
        if discard_oldest {
            Self::DiscardOldest
        } else {
            Self::DiscardNewest
        }
    }
}

// =============================================================================
// SampleQueue
// =============================================================================

/// A bounded FIFO that never blocks the producer.
///
/// # Examples
///
/// ```
/// use vigil_opcua::observe::{OverflowPolicy, SampleQueue};
///
/// let queue = SampleQueue::new(2, OverflowPolicy::DiscardOldest);
/// queue.push(1);
/// queue.push(2);
/// assert_eq!(queue.push(3), Some(1));
/// assert_eq!(queue.drain(), vec![2, 3]);
/// ```
#[derive(Debug)]
pub struct SampleQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
    policy: OverflowPolicy,
    notify: Notify,
    discarded: AtomicU64,
    closed: AtomicBool,
}

impl<T> SampleQueue<T> {
    /// Creates a queue holding at most `capacity` items (minimum 1).
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            policy,
            notify: Notify::new(),
            discarded: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Adds an item, applying the overflow policy when full.
    ///
    /// Returns the item that was dropped, if any. Pushing to a closed queue
    /// drops the item.
    pub fn push(&self, item: T) -> Option<T> {
        if self.is_closed() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return Some(item);
        }

        let dropped = {
            let mut items = self.items.lock();
            if items.len() < self.capacity {
                items.push_back(item);
                None
            } else {
                match self.policy {
                    OverflowPolicy::DiscardOldest => {
                        let oldest = items.pop_front();
                        items.push_back(item);
                        oldest
                    }
                    OverflowPolicy::DiscardNewest => Some(item),
                }
            }
        };

        if dropped.is_some() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
        }
        self.notify.notify_waiters();
        dropped
    }

    /// Removes the oldest item without waiting.
    pub fn pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Removes and returns every buffered item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.items.lock().drain(..).collect()
    }

    /// Waits for the next item.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn recv(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.pop() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Closes the queue; buffered items can still be drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Returns `true` if the queue has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns the number of buffered items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Returns the capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the overflow policy.
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Returns how many items were dropped so far.
    pub fn discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Tests
// =============================================================================

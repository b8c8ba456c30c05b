// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Value observation.
//!
//! Two strategies deliver values of a variable to the same
//! [`ValueDispatcher`]:
//!
//! - **Polling** ([`PollScheduler`]): the client reads the variable on a fixed
//!   schedule.
//! - **Subscription** ([`SubscriptionManager`]): the server samples the
//!   variable and publishes changes.
//!
//! Both run against one shared session held by an [`ObservationContext`].
//! Monitored items are correlated through handles from a single
//! [`ClientHandleGenerator`] per context.

pub mod context;
pub mod dispatch;
pub mod handle;
pub mod poll;
pub mod queue;
pub mod subscription;

pub use context::ObservationContext;
pub use dispatch::{ChannelSink, Observation, QueueSink, TracingSink, ValueDispatcher, ValueSink};
pub use handle::{ClientHandle, ClientHandleGenerator};
pub use poll::{PollExit, PollScheduler, PollTask, PollTaskId, PollTaskStats};
pub use queue::{OverflowPolicy, SampleQueue, DEFAULT_QUEUE_CAPACITY};
pub use subscription::{
    MonitoredItem, RegistrationReport, SubscriptionHandle, SubscriptionManager,
    SubscriptionManagerStats, SubscriptionState,
};

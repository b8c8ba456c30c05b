// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client boundary.
//!
//! - **Values**: [`ValueSample`], [`OpcUaValue`] and [`StatusCode`] as they
//!   arrive from a read or a publish event.
//! - **Transport contract**: the [`SessionProvider`] / [`ObservationSession`]
//!   pair the observation layer is written against.
//! - **Real transport** (feature `real-transport`): the contract bound to the
//!   `opcua` crate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │        observe (poll, subscription)          │
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │   ObservationSession  (Arc, shared)          │
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │   RealSession (opcua) │ in-memory test double │
//! └──────────────────────────────────────────────┘
//! ```

pub mod transport;
pub mod value;

#[cfg(feature = "real-transport")]
mod real_transport;

pub use transport::{
    MonitoredItemRequest, MonitoredItemResult, ObservationSession, SessionProvider,
    SubscriptionId, ValueConsumer,
};
pub use value::{OpcUaValue, StatusCode, ValueSample};

#[cfg(feature = "real-transport")]
pub use real_transport::{RealSession, RealSessionProvider};

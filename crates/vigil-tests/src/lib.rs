// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # VIGIL Integration Tests
//!
//! Test utilities and cross-crate integration suites for the VIGIL OPC UA
//! value observer. Everything here runs without a server: observation is
//! driven through [`common::mocks::MockSession`], a scripted in-memory
//! session.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities
//!   - `fixtures`: Pre-built endpoints, targets, settings and config files
//!   - `logs`: Tracing capture for asserting exact log lines
//!   - `mocks`: Mock session, session provider and recording sink
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p vigil-tests
//!
//! # Run one suite
//! cargo test -p vigil-tests --test integration_observation
//! cargo test -p vigil-tests --test integration_config
//! cargo test -p vigil-tests --test integration_cli
//!
//! # Run the live-server tests
//! VIGIL_TEST_ENDPOINT=opc.tcp://localhost:4840 cargo test -p vigil-tests -- --ignored
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use vigil_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
//!     session.set_value(TargetFixtures::target(), 42.0);
//!     // ... connect an ObservationContext through `provider`
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::logs::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}

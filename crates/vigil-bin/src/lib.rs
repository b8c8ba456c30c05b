// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # vigil-bin
//!
//! CLI binary for VIGIL, the OPC UA value observer.
//!
//! - CLI argument parsing with clap
//! - Configuration resolution (file, environment, `--endpoint`)
//! - Logging initialization
//! - Shutdown on OS signals or a line on stdin
//! - Command implementations (poll, subscribe, read, validate, version)
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────┐
//!                    │   main.rs   │
//!                    └──────┬──────┘
//!                           │
//!                    ┌──────▼──────┐
//!                    │    cli.rs   │
//!                    └──────┬──────┘
//!                           │
//!               ┌───────────┼───────────┐
//!               ▼           ▼           ▼
//!        ┌──────────┐ ┌──────────┐ ┌──────────┐
//!        │ commands │ │ shutdown │ │ logging  │
//!        └────┬─────┘ └──────────┘ └──────────┘
//!             │
//!      ┌──────┴───────┐
//!      │ vigil-opcua  │
//!      │ vigil-config │
//!      └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Poll the configured target once per second
//! vigil poll
//!
//! # Subscribe to a variable on a server without a config file
//! vigil -e opc.tcp://plc:4840 subscribe -t "ns=2;s=Line.Speed"
//!
//! # Read once
//! vigil read --json
//!
//! # Validate configuration
//! vigil -c /etc/vigil/vigil.yaml validate
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod shutdown;

// =============================================================================
// Re-exports
// =============================================================================

pub use cli::{Cli, Commands};
pub use error::{BinError, BinResult};
pub use logging::init_logging;
pub use shutdown::{ShutdownCoordinator, ShutdownReason};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # vigil-config
//!
//! Configuration management for vigil.
//!
//! ## Features
//!
//! - **Schema Definition**: connection, target, poll, subscription,
//!   monitored-item and logging sections with defaults
//! - **Multi-Format Support**: YAML, TOML, and JSON configuration files
//! - **Environment Overrides**: `VIGIL__SECTION__KEY` variables and `${VAR:default}` placeholders
//! - **Human-readable durations**: `500ms`, `2s`, `1m 30s`
//!
//! ## Quick Start
//!
//! ```no_run
//! use vigil_config::loader::load_config;
//!
//! let config = load_config("vigil.yaml").unwrap();
//!
//! println!("Endpoint: {}", config.connection.endpoint);
//! println!("Target: {}", config.target);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader};
pub use schema::{LogFormat, LogLevel, LoggingConfig, VigilConfig, DEFAULT_TARGET};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

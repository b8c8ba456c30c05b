// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `poll`: Read the target on a fixed schedule
//! - `subscribe`: Observe the target through a subscription
//! - `read`: Read the target once
//! - `validate`: Validate configuration file
//! - `version`: Show version information
//!
//! The observation commands are generic over the [`SessionProvider`], so the
//! same code runs against a live server or a scripted session.

mod poll;
mod read;
mod subscribe;
mod validate;
mod version;

pub use poll::poll;
pub use read::read;
pub use subscribe::subscribe;
pub use validate::validate;
pub use version::version;

use std::sync::Arc;

use vigil_config::{ConfigError, ConfigLoader, VigilConfig};
use vigil_opcua::observe::TracingSink;
use vigil_opcua::{SessionProvider, ValueDispatcher};

use crate::cli::{Cli, Commands};
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// Executes the appropriate command based on CLI arguments.
///
/// `config` is the outcome of [`resolve_config`]; `validate` reports a failed
/// load, every other command that needs it propagates the error.
pub async fn execute(cli: &Cli, config: BinResult<VigilConfig>) -> BinResult<()> {
    match &cli.command {
        Commands::Validate(args) => validate::validate(cli, args, config),
        Commands::Version => version::version(cli),
        _ => observe(cli, config?).await,
    }
}

#[cfg(feature = "real-transport")]
async fn observe(cli: &Cli, config: VigilConfig) -> BinResult<()> {
    let provider = vigil_opcua::RealSessionProvider::new();
    let shutdown = ShutdownCoordinator::new().with_stdin(true);
    run_observation(cli, config, &provider, &shutdown).await
}

#[cfg(not(feature = "real-transport"))]
async fn observe(_cli: &Cli, _config: VigilConfig) -> BinResult<()> {
    Err(BinError::init(
        "built without an OPC UA transport; enable the real-transport feature",
    ))
}

/// Runs an observation command through `provider`.
pub async fn run_observation<P: SessionProvider>(
    cli: &Cli,
    config: VigilConfig,
    provider: &P,
    shutdown: &ShutdownCoordinator,
) -> BinResult<()> {
    match &cli.command {
        Commands::Poll(args) => poll::poll(args, config, provider, shutdown).await,
        Commands::Subscribe(args) => {
            subscribe::subscribe(args, config, provider, shutdown).await
        }
        Commands::Read(args) => read::read(args, config, provider).await,
        Commands::Validate(_) | Commands::Version => Err(BinError::runtime(
            "validate and version do not observe a server",
        )),
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Loads the configuration named by `--config` and applies `--endpoint`.
///
/// A missing file is accepted when `--endpoint` is given; every other setting
/// then takes its default value.
pub fn resolve_config(cli: &Cli) -> BinResult<VigilConfig> {
    let mut config = if cli.config.exists() {
        ConfigLoader::new().load(&cli.config)?
    } else if let Some(endpoint) = &cli.endpoint {
        VigilConfig::new(endpoint.clone())
    } else {
        return Err(ConfigError::file_not_found(&cli.config).into());
    };

    if let Some(endpoint) = &cli.endpoint {
        config.connection.endpoint = endpoint.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Dispatcher used by every observation command.
fn log_dispatcher() -> Arc<ValueDispatcher> {
    Arc::new(ValueDispatcher::new().with_sink(Arc::new(TracingSink::new())))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_resolve_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "connection:\n  endpoint: opc.tcp://plc:4840\ntarget: ns=3;s=Line.Speed"
        )
        .unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["vigil", "-c", path.as_str(), "read"]);
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.connection.endpoint, "opc.tcp://plc:4840");
        assert_eq!(config.target.to_string(), "ns=3;s=Line.Speed");
    }

    #[test]
    fn test_resolve_config_endpoint_override() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "connection:\n  endpoint: opc.tcp://plc:4840").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = Cli::parse_from([
            "vigil",
            "-c",
            path.as_str(),
            "-e",
            "opc.tcp://other:4841",
            "read",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.connection.endpoint, "opc.tcp://other:4841");
    }

    #[test]
    fn test_resolve_config_without_file() {
        let cli = Cli::parse_from([
            "vigil",
            "-c",
            "/nonexistent/vigil.yaml",
            "-e",
            "opc.tcp://host:4840",
            "poll",
        ]);
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.connection.endpoint, "opc.tcp://host:4840");
        assert_eq!(config.target.to_string(), vigil_config::DEFAULT_TARGET);
    }

    #[test]
    fn test_resolve_config_missing_file() {
        let cli = Cli::parse_from(["vigil", "-c", "/nonexistent/vigil.yaml", "poll"]);
        let err = resolve_config(&cli).unwrap_err();
        assert!(matches!(err, BinError::Config(ConfigError::FileNotFound { .. })));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_resolve_config_invalid_endpoint() {
        let cli = Cli::parse_from([
            "vigil",
            "-c",
            "/nonexistent/vigil.yaml",
            "-e",
            "http://host:4840",
            "poll",
        ]);
        assert!(resolve_config(&cli).is_err());
    }
}

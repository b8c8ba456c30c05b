// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `poll`: Read the target on a fixed schedule
//! - `subscribe`: Observe the target through a server-side subscription
//! - `read`: Read the target once
//! - `validate`: Validate the configuration file
//! - `version`: Show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use vigil_config::LoggingConfig;
use vigil_opcua::VariableReference;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// VIGIL - value observer for OPC UA variables
///
/// Connects to an OPC UA server and reports the value of one variable, either
/// by polling it on a fixed schedule or through a server-side subscription.
#[derive(Parser, Debug)]
#[command(
    name = "vigil",
    author = "Sylvex <contact@sylvex.io>",
    version = vigil_opcua::VERSION,
    about = "Value observer for OPC UA variables",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "vigil.yaml",
        env = "VIGIL_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Server endpoint, overrides the configuration file
    ///
    /// When the configuration file does not exist, every other setting
    /// takes its default value.
    #[arg(short, long, env = "VIGIL_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        env = "VIGIL_LOG_LEVEL",
        global = true,
        long_help = crate::logging::log_level_help()
    )]
    pub log_level: Option<String>,

    /// Log format (text, json, compact)
    #[arg(long, env = "VIGIL_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the VIGIL CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Poll the target variable on a fixed schedule
    ///
    /// Reads the variable once per period until Ctrl+C, SIGTERM or a line
    /// on stdin.
    Poll(PollArgs),

    /// Observe the target variable through a subscription
    ///
    /// Registers one monitored item and reports every data change until
    /// Ctrl+C, SIGTERM or a line on stdin.
    Subscribe(SubscribeArgs),

    /// Read the target variable once
    Read(ReadArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the configuration file without connecting.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `poll` command.
#[derive(Args, Debug, Default, Clone)]
pub struct PollArgs {
    /// Variable to observe (e.g. "ns=2;s=Machine.Temperature")
    #[arg(short, long)]
    pub target: Option<VariableReference>,

    /// Time between reads (e.g. "1s", "500ms")
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub period: Option<Duration>,

    /// Delay before the first read
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub offset: Option<Duration>,

    /// Upper bound on one read round trip
    #[arg(long, value_parser = humantime::parse_duration)]
    pub read_timeout: Option<Duration>,
}

/// Arguments for the `subscribe` command.
#[derive(Args, Debug, Default, Clone)]
pub struct SubscribeArgs {
    /// Variable to observe (e.g. "ns=2;s=Machine.Temperature")
    #[arg(short, long)]
    pub target: Option<VariableReference>,

    /// Publishing interval of the subscription
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub publishing_interval: Option<Duration>,

    /// Sampling interval of the monitored item
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub sampling_interval: Option<Duration>,

    /// Server-side queue size of the monitored item
    #[arg(long)]
    pub queue_size: Option<u32>,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ReadArgs {
    /// Variable to read (e.g. "ns=2;s=Machine.Temperature")
    #[arg(short, long)]
    pub target: Option<VariableReference>,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<vigil_config::LogFormat> for LogFormat {
    fn from(format: vigil_config::LogFormat) -> Self {
        match format {
            vigil_config::LogFormat::Text => LogFormat::Text,
            vigil_config::LogFormat::Json => LogFormat::Json,
            vigil_config::LogFormat::Compact => LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
    /// TOML format
    Toml,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// Get the effective log level.
    ///
    /// `--quiet` and `--verbose` win over `--log-level`, which wins over the
    /// configuration file.
    pub fn effective_log_level(&self, configured: Option<&LoggingConfig>) -> String {
        if self.quiet {
            "warn".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else if let Some(level) = &self.log_level {
            level.clone()
        } else {
            configured
                .map(|logging| logging.level.as_str())
                .unwrap_or("info")
                .to_string()
        }
    }

    /// Get the effective log format.
    pub fn effective_log_format(&self, configured: Option<&LoggingConfig>) -> LogFormat {
        self.log_format
            .or_else(|| configured.map(|logging| logging.format.into()))
            .unwrap_or_default()
    }
}

impl Default for ValidateArgs {
    fn default() -> Self {
        Self {
            show_config: false,
            format: OutputFormat::Text,
            strict: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

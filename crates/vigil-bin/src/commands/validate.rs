// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use vigil_config::{loader, ConfigFormat, VigilConfig};

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// Executes the `validate` command to validate configuration.
pub fn validate(cli: &Cli, args: &ValidateArgs, config: BinResult<VigilConfig>) -> BinResult<()> {
    let config_path = &cli.config;
    let config =
        config.map_err(|e| e.with_context(format!("Validation of {} failed", config_path.display())))?;

    let warnings = collect_warnings(cli, &config);

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Endpoint:            {}", config.connection.endpoint);
            println!("  Application:         {}", config.connection.application_name);
            println!("  Target:              {}", config.target);
            println!("  Poll period:         {:?}", config.poll.period);
            println!("  Poll offset:         {:?}", config.poll.initial_offset);
            println!("  Publishing interval: {:?}", config.subscription.publishing_interval);
            println!("  Sampling interval:   {:?}", config.monitored_item.sampling_interval);
            println!("  Queue size:          {}", config.monitored_item.queue_size);

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", render(&config, ConfigFormat::Yaml)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "endpoint": config.connection.endpoint,
                    "target": config.target.to_string(),
                    "poll_period_ms": config.poll.period.as_millis() as u64,
                    "publishing_interval_ms": config.subscription.publishing_interval.as_millis() as u64,
                    "sampling_interval_ms": config.monitored_item.sampling_interval.as_millis() as u64,
                    "queue_size": config.monitored_item.queue_size,
                },
                "warnings": warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            let rendered = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("failed to render result: {e}")))?;
            println!("{rendered}");
        }
        OutputFormat::Toml => {
            println!("valid = true");
            println!("config_path = {:?}", config_path.display().to_string());
            println!("warnings = {:?}", warnings);
            if args.show_config {
                println!();
                println!("{}", render(&config, ConfigFormat::Toml)?);
            }
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::Configuration(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}

/// Collects settings that are valid but likely unintended.
fn collect_warnings(cli: &Cli, config: &VigilConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if !cli.config.exists() {
        warnings.push(format!(
            "{} not found, using defaults with the command-line endpoint",
            cli.config.display()
        ));
    }

    if config.monitored_item.sampling_interval > config.subscription.publishing_interval {
        warnings.push(format!(
            "Sampling interval ({:?}) is longer than the publishing interval ({:?})",
            config.monitored_item.sampling_interval, config.subscription.publishing_interval
        ));
    }

    if !config.monitored_item.discard_oldest {
        warnings.push(
            "discard_oldest is disabled; the newest values are dropped when the server queue is full"
                .to_string(),
        );
    }

    warnings
}

fn render(config: &VigilConfig, format: ConfigFormat) -> BinResult<String> {
    Ok(loader::to_string(config, format)?)
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # CLI Integration Tests
//!
//! Runs the `vigil` commands end to end against the mock session provider:
//! argument parsing, configuration resolution, the observation commands and
//! their exit codes.

use std::time::Duration;

use clap::Parser;
use vigil_bin::commands::{execute, resolve_config, run_observation};
use vigil_bin::{BinError, Cli, ShutdownCoordinator};
use vigil_config::VigilConfig;
use vigil_tests::prelude::*;

// =============================================================================
// Helpers
// =============================================================================

const TARGET: &str = "ns=2;s=X.Y";

fn cli(args: &[&str]) -> Cli {
    let mut argv = vec!["vigil", "-e", TargetFixtures::endpoint()];
    argv.extend_from_slice(args);
    Cli::parse_from(argv)
}

fn config() -> VigilConfig {
    VigilConfig::new(TargetFixtures::endpoint())
}

/// Triggers `shutdown` after `delay`.
fn stop_after(shutdown: &ShutdownCoordinator, delay: Duration) {
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        shutdown.initiate_shutdown();
    });
}

// =============================================================================
// Poll Command
// =============================================================================

#[tokio::test]
async fn test_poll_runs_until_shutdown() {
    init_test_logging();
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    session.set_value(TargetFixtures::target(), 42.0);

    let cli = cli(&["poll", "-t", TARGET, "-p", "50ms"]);
    let shutdown = ShutdownCoordinator::new();
    stop_after(&shutdown, Duration::from_millis(300));

    run_observation(&cli, config(), &provider, &shutdown)
        .await
        .unwrap();

    assert!(shutdown.is_shutdown_initiated());
    assert!(session.read_count() >= 2);
    assert_eq!(session.disconnect_count(), 1);
}

#[tokio::test]
async fn test_poll_read_failure_returns_error() {
    init_test_logging();
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    session.set_value(TargetFixtures::target(), 1.0);
    session.fail_all_reads(true);

    let cli = cli(&["poll", "-t", TARGET, "-p", "50ms"]);
    let shutdown = ShutdownCoordinator::new();

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        run_observation(&cli, config(), &provider, &shutdown),
    )
    .await
    .expect("poll should halt on its own")
    .unwrap_err();

    assert_eq!(err.exit_code(), 6);
    assert!(err.to_string().contains("poll halted after 1 ticks"));
    assert!(!shutdown.is_shutdown_initiated());
    assert_eq!(session.disconnect_count(), 1);
}

#[tokio::test]
async fn test_poll_refused_connection() {
    let (provider, _session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    provider.fail_connection(true);

    let cli = cli(&["poll"]);
    let err = run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 5);
    assert!(matches!(err, BinError::WithContext { .. }));
}

#[tokio::test]
async fn test_poll_invalid_override_is_config_error() {
    let (provider, _session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());

    let cli = cli(&["poll", "-p", "0s"]);
    let err = run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert_eq!(provider.connect_count(), 0);
}

// =============================================================================
// Subscribe Command
// =============================================================================

#[tokio::test]
async fn test_subscribe_creates_and_releases_subscription() {
    init_test_logging();
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());

    let cli = cli(&["subscribe", "-t", TARGET, "-p", "500ms", "--queue-size", "4"]);
    let shutdown = ShutdownCoordinator::new();

    let observer = session.clone();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        while observer.active_subscriptions() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        observer.notify(&TargetFixtures::target(), 3.0);
        trigger.initiate_shutdown();
    });

    tokio::time::timeout(
        Duration::from_secs(5),
        run_observation(&cli, config(), &provider, &shutdown),
    )
    .await
    .expect("subscribe should stop on shutdown")
    .unwrap();

    assert_eq!(session.subscriptions_created(), 1);
    assert_eq!(session.subscriptions_deleted(), 1);
    assert_eq!(session.active_subscriptions(), 0);
    assert_eq!(session.disconnect_count(), 1);
}

#[tokio::test]
async fn test_subscribe_rejected_target_fails() {
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    session.reject_target(TargetFixtures::target());

    let cli = cli(&["subscribe", "-t", TARGET]);
    let err = run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 6);
    assert_eq!(session.active_subscriptions(), 0);
    assert_eq!(session.disconnect_count(), 1);
}

#[tokio::test]
async fn test_subscribe_request_failure_fails() {
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    session.fail_create_subscription(true);

    let cli = cli(&["subscribe"]);
    let err = run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 6);
    assert_eq!(session.subscriptions_created(), 0);
}

// =============================================================================
// Read Command
// =============================================================================

#[tokio::test]
async fn test_read_once() {
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    session.set_value(TargetFixtures::target(), 12.5);
    session.set_display_name(TargetFixtures::target(), "Torque");

    let cli = cli(&["read", "-t", TARGET]);
    run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap();

    assert_eq!(session.read_count(), 1);
    assert_eq!(session.disconnect_count(), 1);
}

#[tokio::test]
async fn test_read_json() {
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    session.set_value(TargetFixtures::target(), 12.5);

    let cli = cli(&["read", "-t", TARGET, "--json"]);
    run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap();

    assert_eq!(session.read_count(), 1);
}

#[tokio::test]
async fn test_read_failure_exit_code() {
    let (provider, session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    session.fail_all_reads(true);

    let cli = cli(&["read", "-t", TARGET]);
    let err = run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 6);
    // The session is closed even though the read failed.
    assert_eq!(session.disconnect_count(), 1);
}

#[tokio::test]
async fn test_read_refused_connection_exit_code() {
    let (provider, _session) = MockSessionProvider::with_new_session(TargetFixtures::endpoint());
    provider.fail_connection(true);

    let cli = cli(&["read"]);
    let err = run_observation(&cli, config(), &provider, &ShutdownCoordinator::new())
        .await
        .unwrap_err();

    assert_eq!(err.exit_code(), 5);
}

// =============================================================================
// Configuration and Non-Observing Commands
// =============================================================================

#[test]
fn test_resolve_config_from_yaml_file() {
    let file = ConfigFixtures::write_temp(ConfigFixtures::yaml(), "yaml");
    let path = file.path().to_string_lossy().to_string();

    let cli = Cli::parse_from(["vigil", "-c", path.as_str(), "read"]);
    let config = resolve_config(&cli).unwrap();

    assert_eq!(config.connection.endpoint, "opc.tcp://plc.local:4840");
    assert_eq!(config.target.to_string(), "ns=2;s=Line1.Torque");
}

#[test]
fn test_resolve_config_missing_file_without_endpoint() {
    let dir = temp_test_dir("vigil-cli");
    let path = dir.path().join("absent.yaml").to_string_lossy().to_string();

    let cli = Cli::parse_from(["vigil", "-c", path.as_str(), "read"]);
    let err = resolve_config(&cli).unwrap_err();

    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_execute_validate_accepts_config() {
    let file = ConfigFixtures::write_temp(ConfigFixtures::toml(), "toml");
    let path = file.path().to_string_lossy().to_string();

    let cli = Cli::parse_from(["vigil", "-c", path.as_str(), "validate", "--format", "json"]);
    let config = resolve_config(&cli);

    execute(&cli, config).await.unwrap();
}

#[tokio::test]
async fn test_execute_validate_reports_load_failure() {
    let dir = temp_test_dir("vigil-cli");
    let path = dir.path().join("absent.yaml").to_string_lossy().to_string();

    let cli = Cli::parse_from(["vigil", "-c", path.as_str(), "validate"]);
    let config = resolve_config(&cli);
    let err = execute(&cli, config).await.unwrap_err();

    assert_eq!(err.exit_code(), 1);
    assert!(err.to_string().contains("Validation of"));
}

#[tokio::test]
async fn test_execute_version() {
    let cli = Cli::parse_from(["vigil", "version"]);
    execute(&cli, Ok(config())).await.unwrap();
}

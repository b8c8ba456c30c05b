// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `subscribe` command.

use tracing::{info, warn};
use vigil_config::VigilConfig;
use vigil_opcua::{ObservationContext, OpcUaError, SessionProvider};

use crate::cli::SubscribeArgs;
use crate::commands::log_dispatcher;
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// Executes the `subscribe` command.
///
/// Registers one monitored item on the target, reports data changes until
/// shutdown is triggered, then unregisters and disconnects.
pub async fn subscribe<P: SessionProvider>(
    args: &SubscribeArgs,
    mut config: VigilConfig,
    provider: &P,
    shutdown: &ShutdownCoordinator,
) -> BinResult<()> {
    apply_overrides(args, &mut config);
    config.validate()?;

    let context = ObservationContext::connect(provider, &config.connection, log_dispatcher())
        .await
        .map_err(|e| BinError::from(e).with_context("subscribe"))?;

    let manager = context
        .subscription(config.target.clone())
        .with_subscription_settings(config.subscription.clone())
        .with_item_settings(config.monitored_item.clone());

    let report = match manager.register().await {
        Ok(report) => report,
        Err(e) => {
            context.close().await;
            return Err(BinError::from(e).with_context("subscribe"));
        }
    };

    if report.created.is_empty() {
        manager.unregister().await;
        manager.wait_for_teardown().await;
        context.close().await;
        let error = report
            .failed
            .into_iter()
            .next()
            .map(OpcUaError::from)
            .map(BinError::from)
            .unwrap_or_else(|| BinError::runtime("server created no monitored item"));
        return Err(error.with_context("subscribe"));
    }

    info!(
        node_id = %config.target,
        subscription_id = %report.subscription_id,
        publishing_interval = ?config.subscription.publishing_interval,
        sampling_interval = ?config.monitored_item.sampling_interval,
        "Subscribed; press Enter or Ctrl+C to stop"
    );

    let reason = shutdown.wait_for_shutdown().await;
    info!(reason = %reason, "Stopping subscription");

    if !manager.unregister().await {
        warn!("Subscription was already unregistered");
    }
    info!(
        notifications = manager.stats().notifications(),
        "Subscription finished"
    );
    manager.wait_for_teardown().await;
    context.close().await;

    Ok(())
}

/// Applies command-line overrides to the configuration.
fn apply_overrides(args: &SubscribeArgs, config: &mut VigilConfig) {
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    if let Some(interval) = args.publishing_interval {
        config.subscription.publishing_interval = interval;
    }
    if let Some(interval) = args.sampling_interval {
        config.monitored_item.sampling_interval = interval;
    }
    if let Some(size) = args.queue_size {
        config.monitored_item.queue_size = size;
    }
}

// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `poll` command.

use tracing::{info, warn};
use vigil_config::VigilConfig;
use vigil_opcua::{ObservationContext, PollExit, SessionProvider};

use crate::cli::PollArgs;
use crate::commands::log_dispatcher;
use crate::error::{BinError, BinResult};
use crate::shutdown::ShutdownCoordinator;

/// Executes the `poll` command.
///
/// Polls until shutdown is triggered or the task halts on a read error, then
/// stops the task and disconnects.
pub async fn poll<P: SessionProvider>(
    args: &PollArgs,
    mut config: VigilConfig,
    provider: &P,
    shutdown: &ShutdownCoordinator,
) -> BinResult<()> {
    apply_overrides(args, &mut config);
    config.validate()?;

    let context = ObservationContext::connect(provider, &config.connection, log_dispatcher())
        .await
        .map_err(|e| BinError::from(e).with_context("poll"))?;

    let id = match context.schedule_poll(config.target.clone(), config.poll.clone()) {
        Ok(id) => id,
        Err(e) => {
            context.close().await;
            return Err(e.into());
        }
    };

    info!(
        node_id = %config.target,
        period = ?config.poll.period,
        initial_offset = ?config.poll.initial_offset,
        "Polling; press Enter or Ctrl+C to stop"
    );

    tokio::select! {
        reason = shutdown.wait_for_shutdown() => {
            info!(reason = %reason, "Stopping poll");
        }
        _ = context.scheduler().finished(id) => {
            warn!(node_id = %config.target, "Poll task halted");
        }
    }

    let exit = context.remove_poll(id).await;
    context.close().await;

    match exit {
        Some(PollExit::Failed { ticks, error }) => {
            Err(BinError::from(error).with_context(format!("poll halted after {ticks} ticks")))
        }
        Some(PollExit::Stopped { ticks }) => {
            info!(ticks, "Poll finished");
            Ok(())
        }
        None => Ok(()),
    }
}

/// Applies command-line overrides to the configuration.
fn apply_overrides(args: &PollArgs, config: &mut VigilConfig) {
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    if let Some(period) = args.period {
        config.poll.period = period;
    }
    if let Some(offset) = args.offset {
        config.poll.initial_offset = offset;
    }
    if let Some(timeout) = args.read_timeout {
        config.poll.read_timeout = timeout;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vigil_opcua::VariableReference;

    #[test]
    fn test_apply_overrides() {
        let mut config = VigilConfig::new("opc.tcp://host:4840");
        let args = PollArgs {
            target: Some(VariableReference::new(2, "X.Y")),
            period: Some(Duration::from_millis(500)),
            offset: None,
            read_timeout: Some(Duration::from_secs(2)),
        };

        apply_overrides(&args, &mut config);

        assert_eq!(config.target, VariableReference::new(2, "X.Y"));
        assert_eq!(config.poll.period, Duration::from_millis(500));
        assert_eq!(config.poll.initial_offset, Duration::ZERO);
        assert_eq!(config.poll.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = VigilConfig::new("opc.tcp://host:4840");
        let before = config.poll.clone();
        apply_overrides(&PollArgs::default(), &mut config);
        assert_eq!(config.poll, before);
    }
}

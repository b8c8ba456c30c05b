// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` command.

use std::sync::Arc;

use vigil_config::VigilConfig;
use vigil_opcua::{
    ObservationContext, ObservationSession, SessionProvider, ValueDispatcher, ValueSample,
    VariableReference,
};

use crate::cli::ReadArgs;
use crate::error::{BinError, BinResult};

/// Executes the `read` command: one read of the target, printed to stdout.
pub async fn read<P: SessionProvider>(
    args: &ReadArgs,
    mut config: VigilConfig,
    provider: &P,
) -> BinResult<()> {
    if let Some(target) = &args.target {
        config.target = target.clone();
    }
    config.validate()?;

    let context = ObservationContext::connect(
        provider,
        &config.connection,
        Arc::new(ValueDispatcher::new()),
    )
    .await
    .map_err(|e| BinError::from(e).with_context("read"))?;

    let outcome = read_once(context.session().as_ref(), &config.target).await;
    context.close().await;
    let (display_name, sample) = outcome?;

    if args.json {
        let output = serde_json::json!({
            "node_id": config.target.to_string(),
            "display_name": display_name,
            "value": sample.value.to_string(),
            "status": sample.status_code.to_string(),
            "source_timestamp": sample.source_timestamp.map(|t| t.to_rfc3339()),
            "server_timestamp": sample.server_timestamp.map(|t| t.to_rfc3339()),
        });
        let rendered = serde_json::to_string_pretty(&output)
            .map_err(|e| BinError::runtime(format!("failed to render result: {e}")))?;
        println!("{rendered}");
    } else {
        println!(
            "NodeID: {}, DisplayName: {}, CurrentValue: {}",
            config.target, display_name, sample.value
        );
    }

    Ok(())
}

/// Reads the display name and current value of `target`.
async fn read_once<S: ObservationSession>(
    session: &S,
    target: &VariableReference,
) -> BinResult<(String, ValueSample)> {
    let display_name = session
        .display_name(target)
        .await
        .map_err(|e| BinError::from(e).with_context("read display name"))?;
    let sample = session
        .read_value(target)
        .await
        .map_err(|e| BinError::from(e).with_context("read value"))?;
    Ok((display_name, sample))
}

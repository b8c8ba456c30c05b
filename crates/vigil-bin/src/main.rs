// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! VIGIL - value observer for OPC UA variables
//!
//! Main binary entry point.

use std::time::Duration;

use vigil_bin::error::{report_error_and_exit, BinError};
use vigil_bin::{commands, init_logging, Cli};

/// Bound on blocking work left over at exit, such as a pending stdin read.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() {
    let cli = Cli::parse_args();

    let config = commands::resolve_config(&cli);
    let logging = config.as_ref().ok().map(|config| &config.logging);
    init_logging(
        &cli.effective_log_level(logging),
        cli.effective_log_format(logging),
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => report_error_and_exit(BinError::init(format!(
            "failed to start async runtime: {e}"
        ))),
    };

    let result = runtime.block_on(commands::execute(&cli, config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);

    if let Err(e) = result {
        report_error_and_exit(e);
    }
}

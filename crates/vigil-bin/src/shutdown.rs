// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Graceful shutdown coordination.
//!
//! Observation commands run until one of: an OS signal (SIGTERM, SIGINT,
//! SIGQUIT on Unix, Ctrl+C elsewhere), a line on stdin, or a manual
//! [`ShutdownCoordinator::initiate_shutdown`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};

// =============================================================================
// ShutdownReason
// =============================================================================

/// What ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// An OS signal, by name.
    Signal(&'static str),
    /// A line (or just Enter) on stdin.
    Stdin,
    /// [`ShutdownCoordinator::initiate_shutdown`] was called.
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal(name) => write!(f, "{name}"),
            Self::Stdin => write!(f, "stdin"),
            Self::Requested => write!(f, "requested"),
        }
    }
}

// =============================================================================
// ShutdownCoordinator
// =============================================================================

/// Coordinates shutdown between the running command and its triggers.
///
/// # Example
///
/// ```ignore
/// use vigil_bin::shutdown::ShutdownCoordinator;
///
/// let coordinator = ShutdownCoordinator::new().with_stdin(true);
///
/// let mut rx = coordinator.subscribe();
/// tokio::spawn(async move {
///     rx.recv().await.ok();
///     println!("Shutdown received!");
/// });
///
/// coordinator.wait_for_shutdown().await;
/// ```
#[derive(Clone)]
pub struct ShutdownCoordinator {
    sender: broadcast::Sender<()>,
    shutdown_initiated: Arc<AtomicBool>,
    watch_stdin: bool,
}

impl ShutdownCoordinator {
    /// Creates a coordinator that listens for OS signals only.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            sender,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            watch_stdin: false,
        }
    }

    /// Also ends the wait on a line from stdin.
    ///
    /// End of input is ignored, so a detached process with a closed stdin
    /// keeps running until signalled.
    pub fn with_stdin(mut self, enabled: bool) -> Self {
        self.watch_stdin = enabled;
        self
    }

    /// Subscribes to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Initiates shutdown.
    ///
    /// Only the first call notifies subscribers.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Shutdown initiated");
            let _ = self.sender.send(());
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Waits for a shutdown trigger, then marks shutdown as initiated.
    pub async fn wait_for_shutdown(&self) -> ShutdownReason {
        let mut manual = self.subscribe();

        if self.is_shutdown_initiated() {
            return ShutdownReason::Requested;
        }

        let reason = tokio::select! {
            name = os_signal() => ShutdownReason::Signal(name),
            _ = stdin_line(), if self.watch_stdin => ShutdownReason::Stdin,
            _ = manual.recv() => ShutdownReason::Requested,
        };

        if reason != ShutdownReason::Requested {
            info!(reason = %reason, "Received shutdown trigger");
        }
        self.initiate_shutdown();
        reason
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Triggers
// =============================================================================

/// Resolves with the name of the first OS signal received.
///
/// A handler that cannot be registered is logged and never fires.
#[cfg(unix)]
async fn os_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    async fn recv(kind: SignalKind, name: &'static str) -> &'static str {
        match signal(kind) {
            Ok(mut stream) => {
                stream.recv().await;
                name
            }
            Err(e) => {
                warn!(signal = name, error = %e, "Failed to register signal handler");
                std::future::pending().await
            }
        }
    }

    tokio::select! {
        name = recv(SignalKind::terminate(), "SIGTERM") => name,
        name = recv(SignalKind::interrupt(), "SIGINT") => name,
        name = recv(SignalKind::quit(), "SIGQUIT") => name,
    }
}

#[cfg(not(unix))]
async fn os_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl+C",
        Err(e) => {
            warn!(error = %e, "Failed to register Ctrl+C handler");
            std::future::pending().await
        }
    }
}

/// Resolves when a line is read from stdin.
async fn stdin_line() {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut line = String::new();

    match reader.read_line(&mut line).await {
        Ok(n) if n > 0 => {}
        Ok(_) => std::future::pending().await,
        Err(e) => {
            warn!(error = %e, "Failed to read stdin, ignoring it for shutdown");
            std::future::pending().await
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_coordinator() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx = coordinator.subscribe();

        assert!(!coordinator.is_shutdown_initiated());

        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_manual_shutdown() {
        let coordinator = ShutdownCoordinator::new();

        let trigger = coordinator.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.initiate_shutdown();
        });

        let reason = tokio::time::timeout(Duration::from_secs(1), coordinator.wait_for_shutdown())
            .await
            .expect("wait should resolve");
        assert_eq!(reason, ShutdownReason::Requested);
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_returns_immediately() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();

        let reason = tokio::time::timeout(Duration::from_millis(100), coordinator.wait_for_shutdown())
            .await
            .expect("wait should resolve");
        assert_eq!(reason, ShutdownReason::Requested);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let coordinator = ShutdownCoordinator::new();
        let mut rx1 = coordinator.subscribe();
        let mut rx2 = coordinator.subscribe();

        coordinator.initiate_shutdown();

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_double_shutdown() {
        let coordinator = ShutdownCoordinator::new();

        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutdown_initiated());
    }

    #[test]
    fn test_reason_display() {
        assert_eq!(ShutdownReason::Signal("SIGTERM").to_string(), "SIGTERM");
        assert_eq!(ShutdownReason::Stdin.to_string(), "stdin");
    }
}

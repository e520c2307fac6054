//! Graceful shutdown handling.
//!
//! A root [`CancellationToken`] is cancelled on SIGINT/SIGTERM or on demand.
//! Every request runs under a child token, so in-flight pipelines stop at
//! their next stage boundary once shutdown begins.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Handle for managing graceful shutdown.
#[derive(Clone, Default)]
pub struct GracefulShutdown {
    token: CancellationToken,
}

impl GracefulShutdown {
    /// Create a new graceful shutdown handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled together with the root.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger graceful shutdown.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Initiating graceful shutdown");
            self.token.cancel();
        }
    }

    /// Resolve once shutdown has been triggered.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Spawn a task that triggers shutdown on SIGINT or SIGTERM.
    pub fn listen_for_signals(&self) {
        let token = self.token.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    error!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        error!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => info!("Received Ctrl+C signal"),
                _ = terminate => info!("Received SIGTERM signal"),
                _ = token.cancelled() => return,
            }

            info!("Shutdown signal received, initiating graceful shutdown");
            token.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_cancels_children() {
        let shutdown = GracefulShutdown::new();
        let first = shutdown.child_token();
        let second = shutdown.child_token();
        assert!(!first.is_cancelled());

        shutdown.shutdown();

        assert!(shutdown.is_shutting_down());
        assert!(timeout(Duration::from_millis(100), first.cancelled()).await.is_ok());
        assert!(second.is_cancelled());
    }

    #[tokio::test]
    async fn test_child_cancellation_does_not_propagate_up() {
        let shutdown = GracefulShutdown::new();
        let child = shutdown.child_token();
        child.cancel();
        assert!(!shutdown.is_shutting_down());
    }

    #[test]
    fn test_cancelled_pends_until_shutdown() {
        let shutdown = GracefulShutdown::new();
        let mut waiting = tokio_test::task::spawn(shutdown.cancelled());
        tokio_test::assert_pending!(waiting.poll());

        shutdown.shutdown();
        assert!(waiting.is_woken());
        tokio_test::assert_ready!(waiting.poll());
    }
}

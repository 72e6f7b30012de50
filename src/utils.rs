//! Utility functions.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancel `token` on the first SIGINT or SIGTERM.
///
/// Runs in its own task so a signal that arrives while listeners are still
/// binding is not lost.
pub fn start_shutdown_signal_monitor(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
            _ = token.cancelled() => return,
        }

        info!("SIGTERM received. Shutting down gracefully");
        token.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn monitor_leaves_token_alone_without_a_signal() {
        let token = CancellationToken::new();
        start_shutdown_signal_monitor(token.clone());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!token.is_cancelled());
    }
}

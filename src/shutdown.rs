//! Graceful termination for the daemon.

use std::time::Duration;

use crate::node::RelayNode;

/// Owns the running node and turns ctrl+c into an orderly shutdown with a
/// bounded drain.
pub struct ShutdownManager {
    node: RelayNode,
    drain_timeout: Duration,
}

impl ShutdownManager {
    pub fn new(node: RelayNode) -> ShutdownManager {
        ShutdownManager {
            node,
            drain_timeout: Duration::from_secs(10),
        }
    }

    /// Wait for ctrl+c, then shut the node down.
    pub async fn wait_for_shutdown(self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            return;
        }

        tracing::info!("🛑 Shutdown signal received");

        match tokio::time::timeout(self.drain_timeout, self.node.shutdown()).await {
            Ok(_) => tracing::info!("✓ All tasks shut down gracefully"),
            Err(_) => tracing::warn!("⏱️  Shutdown timeout: Some tasks did not complete"),
        }
    }
}

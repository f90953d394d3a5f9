//! OS signal handling.
//!
//! # Responsibilities
//! - Translate Ctrl+C / SIGINT into the internal shutdown broadcast

use crate::lifecycle::Shutdown;

/// Spawn the signal listener. Triggers shutdown on the first Ctrl+C.
pub fn spawn_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
    });
}

//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! SIGTERM/SIGINT trigger graceful shutdown; SIGHUP requests a config
//! reload (applied to perimeter rule sets only).

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::lifecycle::shutdown::Shutdown;

/// Internal event a signal translates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    Shutdown,
    Reload,
}

/// Listen for OS signals until a shutdown-class signal arrives.
///
/// Reload requests are forwarded on `reload_tx`; the shutdown coordinator
/// is triggered exactly once, after which this task returns.
pub async fn listen(shutdown: Arc<Shutdown>, reload_tx: mpsc::UnboundedSender<()>) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGTERM handler");
                return;
            }
        };
        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Failed to register SIGHUP handler");
                return;
            }
        };

        loop {
            let event = tokio::select! {
                _ = tokio::signal::ctrl_c() => SignalEvent::Shutdown,
                _ = sigterm.recv() => SignalEvent::Shutdown,
                _ = sighup.recv() => SignalEvent::Reload,
            };
            match event {
                SignalEvent::Shutdown => {
                    tracing::info!("Shutdown signal received");
                    shutdown.trigger();
                    return;
                }
                SignalEvent::Reload => {
                    tracing::info!("SIGHUP received, requesting config reload");
                    let _ = reload_tx.send(());
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = reload_tx;
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
    }
}

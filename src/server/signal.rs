// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Signal handler state
pub struct SignalHandler {
    /// Fired once on SIGTERM or SIGINT
    pub shutdown: Arc<Notify>,
    /// Whether shutdown has been requested
    pub shutdown_requested: Arc<AtomicBool>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
            shutdown_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record the request and wake the accept loop.
    ///
    /// `notify_one` stores a permit, so a loop that is between two
    /// `notified()` calls still observes it.
    pub fn request_shutdown(&self, reason: &str) {
        if !self.shutdown_requested.swap(true, Ordering::SeqCst) {
            crate::logger::log_info(&format!(
                "[SIGNAL] {reason} received, initiating graceful shutdown"
            ));
            self.shutdown.notify_one();
        }
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal handlers (Unix)
///
/// Registration happens before spawning so a failure surfaces to the caller.
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    crate::logger::log_debug(&format!(
        "[SIGNAL] SIGTERM/SIGINT handlers registered (pid {})",
        std::process::id()
    ));

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => handler.request_shutdown("SIGTERM"),
            _ = sigint.recv() => handler.request_shutdown("SIGINT"),
        }
    });
    Ok(())
}

/// Fallback for other platforms: only Ctrl+C is handled
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            handler.request_shutdown("Ctrl+C");
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_request_shutdown_is_observed_later() {
        let handler = SignalHandler::new();
        handler.request_shutdown("test");
        assert!(handler.shutdown_requested.load(Ordering::SeqCst));

        // Permit was stored before anyone waited
        tokio::time::timeout(Duration::from_secs(1), handler.shutdown.notified())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_repeated_requests_notify_once() {
        let handler = SignalHandler::new();
        handler.request_shutdown("first");
        handler.request_shutdown("second");

        handler.shutdown.notified().await;
        let again =
            tokio::time::timeout(Duration::from_millis(50), handler.shutdown.notified()).await;
        assert!(again.is_err());
    }
}

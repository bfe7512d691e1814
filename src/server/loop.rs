// Server loop module
// Accepts connections until shutdown, then drains in-flight ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

use super::connection;
use crate::config::AppState;
use crate::logger;

/// How often the drain phase re-checks the active connection count
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Back-off after a failed `accept`, e.g. when the process is out of descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Run the accept loop until `shutdown` fires.
///
/// After shutdown the listener is closed, open connections are told to finish
/// their current request, and the loop waits up to
/// `performance.shutdown_grace` seconds for them. Returns the number of
/// connections still open when the grace period ran out.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
) -> usize {
    let active = Arc::new(AtomicUsize::new(0));
    let (stop_tx, stop_rx) = watch::channel(false);

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    connection::accept_connection(stream, peer_addr, &state, &active, &stop_rx);
                }
                Err(e) => {
                    logger::log_error(&format!("Failed to accept connection: {e}"));
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            () = shutdown.notified() => break,
        }
    }

    drop(listener);
    logger::log_shutdown(active.load(Ordering::SeqCst));
    // Receivers are held by every live connection task and `stop_rx`
    let _ = stop_tx.send(true);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    let remaining = drain(&active, grace).await;
    if remaining > 0 {
        logger::log_warning(&format!(
            "Grace period elapsed with {remaining} connection(s) still open"
        ));
    } else {
        logger::log_info("All connections closed");
    }
    remaining
}

/// Wait until `active` reaches zero or `grace` elapses
async fn drain(active: &AtomicUsize, grace: Duration) -> usize {
    let deadline = Instant::now() + grace;
    loop {
        let count = active.load(Ordering::SeqCst);
        if count == 0 || Instant::now() >= deadline {
            return count;
        }
        tokio::time::sleep(DRAIN_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_drain_returns_immediately_when_idle() {
        let active = AtomicUsize::new(0);
        assert_eq!(drain(&active, Duration::from_secs(5)).await, 0);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let active = AtomicUsize::new(2);
        let started = std::time::Instant::now();
        assert_eq!(drain(&active, Duration::from_millis(120)).await, 2);
        assert!(started.elapsed() >= Duration::from_millis(120));
    }

    #[tokio::test]
    async fn test_serves_then_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_dirs(dir.path(), dir.path());
        config.performance.shutdown_grace = 1;
        let state = AppState::new(config);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /files HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        client.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.ends_with("[]"));

        shutdown.notify_one();
        let remaining = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remaining, 0);
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_closes_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new(Config::for_dirs(dir.path(), dir.path()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(listener, state, Arc::clone(&shutdown)));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut buf = [0u8; 512];
        let n = client.read(&mut buf).await.unwrap();
        assert!(buf[..n].starts_with(b"HTTP/1.1 200 OK"));

        shutdown.notify_one();
        let remaining = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(remaining, 0);
    }
}

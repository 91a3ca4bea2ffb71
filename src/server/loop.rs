// Server loop module
// Accepts connections until shutdown, then drains the active ones

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config::AppState;
use crate::logger;

/// Interval between checks of the active connection count while draining
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept connections until a shutdown is requested
///
/// After the listener closes, waits up to `performance.shutdown_grace`
/// seconds for in-flight connections to finish.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    signals: Arc<SignalHandler>,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(
                            stream,
                            peer_addr,
                            &state,
                            &active_connections,
                            &signals,
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = signals.wait_shutdown() => break,
        }
    }

    drop(listener);
    let active = active_connections.load(Ordering::SeqCst);
    logger::log_shutdown(active);

    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    let drained = tokio::time::timeout(grace, async {
        while active_connections.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await;

    match drained {
        Ok(()) => logger::log_info("[Shutdown] All connections closed"),
        Err(_) => logger::log_warning(&format!(
            "[Shutdown] Grace period elapsed with {} connection(s) still open",
            active_connections.load(Ordering::SeqCst)
        )),
    }
}

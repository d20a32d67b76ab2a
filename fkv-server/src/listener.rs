//! # Listener
//!
//! Accepts TCP connections and spawns one task per connection, running
//! until a cancellation signal arrives.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::connection::{handle_connection, Shared};

/// Binds `addr` and serves connections until `shutdown` is cancelled.
///
/// Each connection is handled on its own task; a connection error is logged
/// and does not bring down the listener or any other connection. Shutdown
/// only stops new accepts — connections already in flight run their read
/// loop to completion (it naturally ends once the peer disconnects), and
/// `serve` does not return until every spawned connection task has finished.
pub async fn serve(
    addr: &str,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                let shared = Arc::clone(&shared);
                connections.spawn(async move {
                    tracing::debug!(%peer, "connection accepted");
                    if let Err(err) = handle_connection(stream, shared).await {
                        tracing::warn!(%peer, error = %err, "connection ended with error");
                    }
                });
            }
            _ = shutdown.cancelled() => {
                tracing::info!("listener shutting down, draining in-flight connections");
                break;
            }
        }
    }

    while let Some(result) = connections.join_next().await {
        if let Err(err) = result {
            tracing::warn!(error = %err, "connection task panicked");
        }
    }

    Ok(())
}

//! # Janitor
//!
//! Periodic background sweep that purges expired entries from a [`Store`].
//!
//! Lazy expiration already hides expired keys from every read path, so the
//! Janitor exists only to reclaim memory that nobody happens to read again —
//! a key set with a TTL and never touched afterward would otherwise sit in
//! its shard forever.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use crate::store::Store;

/// Handle to a running Janitor task.
///
/// Dropping this handle does not stop the sweep; call [`JanitorHandle::stop`]
/// explicitly during shutdown.
pub struct JanitorHandle {
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Aborts the sweep task and waits for it to unwind.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// Spawns a task that calls [`Store::purge_expired`] every `interval`.
///
/// An `interval` of zero disables the sweep (the task still spawns, since
/// `tokio::time::interval` with a zero period would busy-loop); callers
/// who want no sweep at all should simply not call this function.
pub fn spawn(store: Arc<Store>, interval: Duration) -> JanitorHandle {
    let interval = interval.max(Duration::from_millis(1));

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let removed = store.purge_expired(Instant::now());
            if removed > 0 {
                tracing::debug!(removed, "janitor purged expired keys");
            }
        }
    });

    JanitorHandle { task }
}

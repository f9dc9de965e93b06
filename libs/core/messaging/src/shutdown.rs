//! Broadcast-once shutdown with a join barrier over spawned workers.

use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[derive(Debug, Default)]
pub(crate) struct Shutdown {
    /// Held while spawning so a worker is either tracked before `close`
    /// starts waiting or refused.
    closed: Mutex<bool>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn closed(&self) -> MutexGuard<'_, bool> {
        // the flag is a plain bool, a poisoned lock still holds a valid value
        self.closed.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed()
    }

    /// Fires once when [`close`](Self::close) is first called.
    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a worker that [`close`](Self::close) will wait for.
    ///
    /// Returns `false` without spawning once closed.
    pub(crate) fn spawn<F>(&self, worker: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let closed = self.closed();
        if *closed {
            return false;
        }
        self.tracker.spawn(worker);
        true
    }

    /// Cancel all workers and wait for them to exit.
    ///
    /// Only the first call waits; later calls return `false` immediately.
    pub(crate) async fn close(&self) -> bool {
        {
            let mut closed = self.closed();
            if *closed {
                return false;
            }
            *closed = true;
        }
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        true
    }
}

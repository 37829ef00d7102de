//! Facility to wait for a dynamic set of requests to settle, with a single
//! waiter and many waitees. Requests hold an RAII guard for as long as their
//! outcome is undecided; the waiter observes the guard count through a
//! [`tokio::sync::watch`] channel and wakes on every settle, so quiescence
//! checks can be repeated until they hold.

use tokio::sync::watch;

/// Tracks how many submitted requests have not yet reached a terminal state.
#[derive(Debug)]
pub(crate) struct InFlight {
    count: watch::Sender<usize>,
}

/// RAII guard representing one undecided request.
///
/// Dropping the guard marks the request as settled and wakes anyone blocked
/// in [`InFlight::wait_idle`].
#[derive(Debug)]
pub(crate) struct InFlightGuard {
    count: watch::Sender<usize>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        let (count, _) = watch::channel(0);
        Self { count }
    }

    /// Register one more undecided request.
    pub(crate) fn insert(&self) -> InFlightGuard {
        self.count.send_modify(|count| *count += 1);
        InFlightGuard {
            count: self.count.clone(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        *self.count.borrow() == 0
    }

    /// Wait until no undecided requests remain. Returns immediately when the
    /// set is already empty.
    pub(crate) async fn wait_idle(&self) {
        let mut rx = self.count.subscribe();
        // Cannot fail: `self` keeps the sending half alive for the duration.
        let _ = rx.wait_for(|count| *count == 0).await;
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.count.send_modify(|count| *count -= 1);
    }
}

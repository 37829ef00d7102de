//! FIFO of pending requests, shared between submitters, the coordinator, and
//! retrying workers. First come, first served for fresh submissions; a
//! requeued request goes to the back of the line.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use crate::types::Request;

#[derive(Debug)]
pub(crate) struct RequestQueue<C> {
    pending: Mutex<VecDeque<Request<C>>>,
    arrival: Notify,
}

impl<C> RequestQueue<C> {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            arrival: Notify::new(),
        }
    }

    /// Append at the tail. Never blocks; the queue is unbounded.
    pub(crate) fn offer(&self, request: Request<C>) {
        self.pending
            .lock()
            .expect("request queue lock poisoned")
            .push_back(request);
        self.arrival.notify_one();
    }

    /// Remove and return the head, waiting up to `timeout` for one to arrive.
    pub(crate) async fn poll(&self, timeout: Duration) -> Option<Request<C>> {
        tokio::time::timeout(timeout, async {
            loop {
                // Register for a wakeup before checking, so an offer landing
                // in between is not lost.
                let arrival = self.arrival.notified();
                if let Some(request) = self.pop() {
                    return request;
                }
                arrival.await;
            }
        })
        .await
        .ok()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending
            .lock()
            .expect("request queue lock poisoned")
            .is_empty()
    }

    /// Remove everything at once; used at teardown to settle leftovers.
    pub(crate) fn drain(&self) -> Vec<Request<C>> {
        self.pending
            .lock()
            .expect("request queue lock poisoned")
            .drain(..)
            .collect()
    }

    fn pop(&self) -> Option<Request<C>> {
        self.pending
            .lock()
            .expect("request queue lock poisoned")
            .pop_front()
    }
}

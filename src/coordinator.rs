//! The single admission loop between the request queue and the worker set.
//!
//! Admission is centralised here on purpose: workers update the shared
//! tracker but never consult it to dispatch, so when the budget flips from
//! zero back to positive there is exactly one decision point and no
//! thundering herd of workers racing for the fresh window.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::{Semaphore, watch};
use tokio::time::sleep;

use crate::component::Component;
use crate::queue::RequestQueue;
use crate::ratelimit::RateLimitTracker;
use crate::types::Request;
use crate::worker::Worker;

/// How long one queue poll waits before the loop re-examines the world
const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Back-off when the budget is spent but the reset instant is near or unknown
const ZERO_BUDGET_BACKOFF: Duration = Duration::from_secs(1);
/// Longest single back-off sleep while waiting out a known reset instant
const MAX_BACKOFF: Duration = Duration::from_secs(5);

pub(crate) struct Coordinator<C> {
    queue: Arc<RequestQueue<C>>,
    tracker: Arc<RateLimitTracker>,
    workers: Arc<Semaphore>,
    worker: Worker<C>,
    shutdown: watch::Receiver<bool>,
}

impl<C: Component> Coordinator<C> {
    pub(crate) fn new(
        queue: Arc<RequestQueue<C>>,
        tracker: Arc<RateLimitTracker>,
        workers: Arc<Semaphore>,
        worker: Worker<C>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            tracker,
            workers,
            worker,
            shutdown,
        }
    }

    /// Run until shutdown is requested.
    pub(crate) async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // Budget spent and the window's end is known: sleep it out, then
            // let the next response re-establish how much budget came back.
            let (remaining, reset_at) = self.tracker.admission();
            if remaining == 0
                && let Some(wait) = until(reset_at)
            {
                log::info!(
                    "Rate limit exhausted, waiting {} seconds for reset",
                    wait.as_secs()
                );
                if self.pause(wait).await.is_break() {
                    break;
                }
                self.tracker.forget_remaining();
            }

            let Some(request) = self.next_request().await else {
                continue;
            };

            // Re-check: the budget may have been spent while we were polling.
            let (remaining, reset_at) = self.tracker.admission();
            if remaining == 0 {
                self.hold_back(request, reset_at).await;
                continue;
            }

            let workers = Arc::clone(&self.workers);
            let permit = tokio::select! {
                permit = workers.acquire_owned() => {
                    // The semaphore is never closed while the client lives
                    match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    }
                }
                _ = self.shutdown.changed() => {
                    self.queue.offer(request);
                    break;
                }
            };

            let worker = self.worker.clone();
            tokio::spawn(async move {
                worker.process(request).await;
                drop(permit);
            });
        }
    }

    /// Timed poll, abandoned early when shutdown is flagged.
    async fn next_request(&mut self) -> Option<Request<C>> {
        tokio::select! {
            request = self.queue.poll(POLL_INTERVAL) => request,
            _ = self.shutdown.changed() => None,
        }
    }

    /// Zero budget at dispatch time: the request goes back to the tail and
    /// the loop backs off briefly instead of spinning on the queue.
    async fn hold_back(&mut self, request: Request<C>, reset_at: Option<SystemTime>) {
        self.queue.offer(request);
        let backoff = until(reset_at).map_or(ZERO_BUDGET_BACKOFF, |wait| wait.min(MAX_BACKOFF));
        if self.pause(backoff).await.is_break() {
            return;
        }
        // Without a reset instant still ahead of us nothing would ever clear
        // the zero; forget it so a single probe can re-establish the budget.
        let (_, reset_at) = self.tracker.admission();
        if until(reset_at).is_none() {
            self.tracker.forget_remaining();
        }
    }

    async fn pause(&mut self, duration: Duration) -> ControlFlow<()> {
        tokio::select! {
            () = sleep(duration) => ControlFlow::Continue(()),
            _ = self.shutdown.changed() => ControlFlow::Break(()),
        }
    }
}

/// Time left until `instant`, if it lies in the future.
fn until(instant: Option<SystemTime>) -> Option<Duration> {
    instant.and_then(|at| at.duration_since(SystemTime::now()).ok())
}

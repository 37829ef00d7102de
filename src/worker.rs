//! Execution of a single enrichment request: one GET, one verdict.
//!
//! Workers never decide admission; they report what the server said through
//! the shared tracker and either settle the request or put it back in line.

use std::sync::Arc;

use http::header::RETRY_AFTER;

use crate::component::Component;
use crate::content::ContentHandler;
use crate::license;
use crate::queue::RequestQueue;
use crate::ratelimit::{RateLimitTracker, parse_retry_after};
use crate::types::{ErrorKind, Request, Status};

#[derive(Debug)]
pub(crate) struct Worker<C> {
    http: reqwest::Client,
    queue: Arc<RequestQueue<C>>,
    tracker: Arc<RateLimitTracker>,
    content: Arc<dyn ContentHandler>,
    /// Retries allowed on top of the first try
    max_retries: u64,
}

// Derived Clone would bound C: Clone, which the queue handle doesn't need
impl<C> Clone for Worker<C> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            queue: Arc::clone(&self.queue),
            tracker: Arc::clone(&self.tracker),
            content: Arc::clone(&self.content),
            max_retries: self.max_retries,
        }
    }
}

impl<C: Component> Worker<C> {
    pub(crate) fn new(
        http: reqwest::Client,
        queue: Arc<RequestQueue<C>>,
        tracker: Arc<RateLimitTracker>,
        content: Arc<dyn ContentHandler>,
        max_retries: u64,
    ) -> Self {
        Self {
            http,
            queue,
            tracker,
            content,
            max_retries,
        }
    }

    /// Fetch the request's URL and settle or requeue it based on the
    /// response.
    pub(crate) async fn process(&self, request: Request<C>) {
        let response = match self.http.get(request.uri.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                log::debug!("Network error for {}: {e}", request.uri);
                return self.retry(request, ErrorKind::NetworkRequest(e));
            }
        };

        // Headers first: even an error response carries quota information.
        self.tracker.observe(response.headers());

        let status = response.status();
        match status.as_u16() {
            200 => {
                let body = match response.text().await {
                    Ok(body) => body,
                    Err(e) => return self.retry(request, ErrorKind::ReadResponseBody(e)),
                };
                self.settle_found(request, &body);
            }
            404 => {
                // A conclusive answer worth remembering: don't ask again.
                self.save(&request, None);
                request.finish(Status::Absent);
            }
            429 => {
                log::warn!("Rate limited (429), re-queuing request: {}", request.uri);
                let retry_after = response.headers().get(RETRY_AFTER).and_then(|value| {
                    parse_retry_after(value)
                        .inspect_err(|e| log::warn!("Invalid Retry-After header: {e}"))
                        .ok()
                });
                self.tracker.exhaust(retry_after);
                self.retry(request, ErrorKind::RejectedStatusCode(status));
            }
            _ => {
                log::warn!(
                    "Request failed with status {status}, re-queuing: {}",
                    request.uri
                );
                self.retry(request, ErrorKind::RejectedStatusCode(status));
            }
        }
    }

    fn settle_found(&self, mut request: Request<C>, body: &str) {
        self.save(&request, Some(body));
        license::annotate(&mut request.component, body);
        request.finish(Status::Found);
    }

    fn save(&self, request: &Request<C>, payload: Option<&str>) {
        if let Err(e) = self.content.store(&request.uri, payload) {
            // The response is still usable; only persistence suffered.
            log::warn!("Cannot cache content for {}: {e}", request.uri);
        }
    }

    /// Put the request back at the tail of the line, or settle it as failed
    /// once the retry budget is spent.
    fn retry(&self, mut request: Request<C>, cause: ErrorKind) {
        if request.attempts < self.max_retries {
            request.attempts += 1;
            self.queue.offer(request);
        } else {
            log::warn!(
                "Giving up on {} after {} attempts: {cause}",
                request.uri,
                request.attempts + 1
            );
            request.finish(Status::Failed(cause));
        }
    }
}

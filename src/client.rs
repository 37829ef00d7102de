//! Handler of enrichment requests.
//!
//! This module defines two structs, [`Client`] and [`ClientBuilder`].
//! `Client` accepts component/URL pairs, answers from the content store when
//! it can, and otherwise routes the request through the rate-limit-aware
//! queue. `ClientBuilder` exposes a finer level of granularity for building
//! a `Client`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use typed_builder::TypedBuilder;
use url::Url;

use crate::component::Component;
use crate::content::{ContentError, ContentHandler};
use crate::coordinator::Coordinator;
use crate::license;
use crate::queue::RequestQueue;
use crate::ratelimit::RateLimitTracker;
use crate::types::{Enrichment, ErrorKind, Request, Response, Result, Status};
use crate::waiter::InFlight;
use crate::worker::Worker;

/// Default number of requests that may be on the wire at once, 8.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Default number of retries before a request is deemed as failed, 3.
pub const DEFAULT_MAX_RETRIES: u64 = 3;
/// Default number of redirects followed before a request is deemed as failed, 5.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
/// Default user agent, `clearlydefined-<PKG_VERSION>`.
pub const DEFAULT_USER_AGENT: &str = concat!("clearlydefined/", env!("CARGO_PKG_VERSION"));

/// A timeout for only the connect phase of a request.
const CONNECT_TIMEOUT: u64 = 10;
/// How long `shutdown` waits for in-flight workers before giving up on them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Builder for [`Client`].
///
/// Only the content store is mandatory; everything else has defaults that
/// match the service's behavior.
///
/// ```no_run
/// use std::sync::Arc;
/// use clearlydefined::{ClientBuilder, MemoryCache};
///
/// # fn main() -> clearlydefined::Result<()> {
/// # let _ = tokio::runtime::Runtime::new().unwrap().enter();
/// let client = ClientBuilder::builder()
///     .content_handler(Arc::new(MemoryCache::new()))
///     .max_concurrency(4)
///     .build()
///     .client::<Vec<(String, String)>>()?;
/// # Ok(())
/// # }
/// ```
#[derive(TypedBuilder, Debug)]
#[builder(field_defaults(default))]
pub struct ClientBuilder {
    /// The shared content store consulted before, and populated after, every
    /// network round trip.
    #[builder(!default)]
    content_handler: Arc<dyn ContentHandler>,

    /// Maximum number of concurrently executing requests.
    #[builder(default = DEFAULT_MAX_CONCURRENCY)]
    max_concurrency: usize,

    /// Maximum number of retries per request before returning an error.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    max_retries: u64,

    /// Maximum number of redirects per request before returning an error.
    #[builder(default = DEFAULT_MAX_REDIRECTS)]
    max_redirects: usize,

    /// User-agent used for requests.
    #[builder(default_code = "String::from(DEFAULT_USER_AGENT)")]
    user_agent: String,

    /// Response timeout per request. The transport default applies when
    /// unset.
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Instantiates a [`Client`] and starts its coordinator.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an `Err` if the request client cannot be created.
    /// See [here](https://docs.rs/reqwest/latest/reqwest/struct.ClientBuilder.html#errors).
    pub fn client<C: Component>(self) -> Result<Client<C>> {
        let http = reqwest::ClientBuilder::new()
            .gzip(true)
            .user_agent(self.user_agent.as_str())
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT))
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects));
        let http = match self.timeout {
            Some(t) => http.timeout(t),
            None => http,
        }
        .build()
        .map_err(ErrorKind::BuildRequestClient)?;

        let queue = Arc::new(RequestQueue::new());
        let tracker = Arc::new(RateLimitTracker::new());
        let workers = Arc::new(Semaphore::new(self.max_concurrency));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = Worker::new(
            http,
            Arc::clone(&queue),
            Arc::clone(&tracker),
            Arc::clone(&self.content_handler),
            self.max_retries,
        );
        let coordinator = Coordinator::new(
            Arc::clone(&queue),
            Arc::clone(&tracker),
            Arc::clone(&workers),
            worker,
            shutdown_rx,
        );

        Ok(Client {
            queue,
            tracker,
            content_handler: self.content_handler,
            in_flight: InFlight::new(),
            workers,
            max_concurrency: self.max_concurrency,
            shutdown,
            coordinator: Mutex::new(Some(tokio::spawn(coordinator.run()))),
        })
    }
}

/// Accepts enrichment requests and resolves them against the content store
/// or the definitions service, honoring the service's declared rate limits.
///
/// See [`ClientBuilder`] which contains sane defaults for all configuration
/// options.
#[derive(Debug)]
pub struct Client<C> {
    queue: Arc<RequestQueue<C>>,
    tracker: Arc<RateLimitTracker>,
    content_handler: Arc<dyn ContentHandler>,
    in_flight: InFlight,
    workers: Arc<Semaphore>,
    max_concurrency: usize,
    shutdown: watch::Sender<bool>,
    coordinator: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Component> Client<C> {
    /// Submit a request to enrich `component` with the definition behind
    /// `url`.
    ///
    /// Consults the content store first: a stored body annotates the
    /// component and resolves before this method returns, and a negative
    /// entry resolves immediately with the component untouched. Only a miss
    /// puts the request in line for the network.
    ///
    /// Never blocks on the network and may be called from many tasks at
    /// once. All failures are reported through the returned future; the
    /// component always travels back to the caller inside the resolved
    /// [`Response`].
    pub fn submit(&self, component: C, url: Url) -> Enrichment<C> {
        let mut component = component;

        if !matches!(url.scheme(), "http" | "https") {
            return Enrichment::ready(Response::new(
                component,
                Status::Failed(ErrorKind::UnsupportedScheme(url)),
            ));
        }

        match self.content_handler.content(&url) {
            Ok(body) => {
                license::annotate(&mut component, &body);
                return Enrichment::ready(Response::new(component, Status::Found));
            }
            Err(ContentError::Absent) => {
                return Enrichment::ready(Response::new(component, Status::Absent));
            }
            Err(ContentError::Miss) => {}
            Err(ContentError::Io(e)) => {
                // A broken store only costs us the shortcut
                log::warn!("Content store lookup failed for {url}: {e}");
            }
        }

        let (request, enrichment) = Request::new(component, url, self.in_flight.insert());
        self.queue.offer(request);
        enrichment
    }

    /// Wait until every submitted request has settled.
    ///
    /// Returns promptly when the client is already idle. Settling includes
    /// requests that workers put back in line: the check is repeated after
    /// every completion until the queue and the in-flight set are both
    /// empty at the same time. Waiting tears nothing down; call
    /// [`Client::shutdown`] for that.
    pub async fn wait_for_completion(&self) {
        loop {
            self.in_flight.wait_idle().await;
            if self.queue.is_empty() && self.in_flight.is_empty() {
                return;
            }
        }
    }

    /// Tear the client down.
    ///
    /// Stops the coordinator, waits a bounded time for in-flight workers to
    /// finish their current round trip, and settles every request still in
    /// line as [`Status::Failed`] so no caller future is left dangling.
    /// Safe to call multiple times.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let coordinator = self
            .coordinator
            .lock()
            .expect("coordinator lock poisoned")
            .take();
        if let Some(coordinator) = coordinator {
            if let Err(e) = coordinator.await {
                log::warn!("Coordinator exited abnormally: {e}");
            }
        }

        // Reacquiring every permit means every worker has returned
        let drained = timeout(
            SHUTDOWN_GRACE,
            Arc::clone(&self.workers).acquire_many_owned(
                u32::try_from(self.max_concurrency).unwrap_or(u32::MAX),
            ),
        )
        .await;
        match drained {
            Ok(Ok(_permits)) => {}
            Ok(Err(_closed)) => {}
            Err(_) => log::warn!(
                "Workers still busy after {} seconds, abandoning them",
                SHUTDOWN_GRACE.as_secs()
            ),
        }

        for request in self.queue.drain() {
            request.finish(Status::Failed(ErrorKind::Shutdown));
        }
    }

    /// The rate-limit state last reported by the service.
    #[must_use]
    pub fn rate_limit(&self) -> &RateLimitTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MemoryCache;
    use crate::test_utils::TestComponent;

    fn client(content: Arc<dyn ContentHandler>) -> Client<TestComponent> {
        ClientBuilder::builder()
            .content_handler(content)
            .build()
            .client()
            .unwrap()
    }

    #[tokio::test]
    async fn test_cache_hit_resolves_synchronously() {
        let content = Arc::new(MemoryCache::new());
        let url = Url::parse("https://api.example/def").unwrap();
        content
            .store(&url, Some(r#"{"licensed":{"declared":"Apache-2.0"}}"#))
            .unwrap();

        let client = client(content);
        let enrichment = client.submit(TestComponent::default(), url);
        assert!(enrichment.is_ready());
        assert!(client.queue.is_empty());

        let response = enrichment.await.unwrap();
        assert!(matches!(response.status(), Status::Found));
        assert_eq!(
            response.component().property(license::LICENSE_PROPERTY),
            Some("Apache-2.0")
        );
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_negative_entry_resolves_synchronously() {
        let content = Arc::new(MemoryCache::new());
        let url = Url::parse("https://api.example/def").unwrap();
        content.store(&url, None).unwrap();

        let client = client(content);
        let enrichment = client.submit(TestComponent::default(), url);
        assert!(enrichment.is_ready());
        assert!(client.queue.is_empty());

        let response = enrichment.await.unwrap();
        assert!(matches!(response.status(), Status::Absent));
        assert!(response.component().properties.is_empty());
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_unsupported_scheme_fails_synchronously() {
        let client = client(Arc::new(MemoryCache::new()));
        let enrichment = client.submit(
            TestComponent::default(),
            Url::parse("ftp://api.example/def").unwrap(),
        );
        assert!(enrichment.is_ready());

        let response = enrichment.await.unwrap();
        assert!(matches!(
            response.status(),
            Status::Failed(ErrorKind::UnsupportedScheme(_))
        ));
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_wait_for_completion_when_idle() {
        let client = client(Arc::new(MemoryCache::new()));
        // must return promptly with nothing submitted
        tokio::time::timeout(Duration::from_secs(1), client.wait_for_completion())
            .await
            .unwrap();
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_settles_queued_requests() {
        let content = Arc::new(MemoryCache::new());
        let client = client(content);
        client.shutdown().await;

        // Submitted after shutdown: lands in the queue, nobody serves it,
        // a second shutdown settles it.
        let enrichment = client.submit(
            TestComponent::default(),
            Url::parse("https://api.example/def").unwrap(),
        );
        client.shutdown().await;

        let response = enrichment.await.unwrap();
        assert!(matches!(
            response.status(),
            Status::Failed(ErrorKind::Shutdown)
        ));
    }
}

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use url::Url;

use crate::waiter::InFlightGuard;
use crate::{ErrorKind, Result};

/// Terminal status of an enrichment request.
#[allow(variant_size_differences)]
#[derive(Debug)]
pub enum Status {
    /// A definition was fetched from the service or served from the cache.
    /// The component carries a `clearly-defined` property if the definition
    /// declared a license.
    Found,
    /// The service has no definition for these coordinates. This is a normal
    /// outcome, not an error; the component is returned unchanged.
    Absent,
    /// The request was given up on; the component is returned unchanged.
    Failed(ErrorKind),
}

impl Status {
    /// Returns `true` unless the request was given up on.
    ///
    /// A confirmed-absent definition counts as success: the service answered
    /// conclusively and the answer is cached.
    #[inline]
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Status::Found | Status::Absent)
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Found => f.write_str("Found"),
            Status::Absent => f.write_str("Absent"),
            Status::Failed(e) => write!(f, "Failed: {e}"),
        }
    }
}

/// Outcome of one enrichment request. Hands the component back to the caller
/// together with how the request went.
#[derive(Debug)]
pub struct Response<C> {
    component: C,
    status: Status,
}

impl<C> Response<C> {
    pub(crate) const fn new(component: C, status: Status) -> Self {
        Self { component, status }
    }

    /// How the request terminated
    #[must_use]
    pub const fn status(&self) -> &Status {
        &self.status
    }

    /// The enriched (or unchanged) component
    #[must_use]
    pub const fn component(&self) -> &C {
        &self.component
    }

    /// Consume the response, returning the component
    #[must_use]
    pub fn into_component(self) -> C {
        self.component
    }

    /// Consume the response, returning component and status
    #[must_use]
    pub fn into_parts(self) -> (C, Status) {
        (self.component, self.status)
    }
}

/// A single enrichment request travelling between the queue and the workers.
///
/// The completion channel is created once, here, and moves with the record
/// through every requeue. Finishing consumes the record, so a request can
/// never resolve its future twice.
#[derive(Debug)]
pub(crate) struct Request<C> {
    pub(crate) component: C,
    pub(crate) uri: Url,
    /// Number of retries performed so far (the first try is not a retry)
    pub(crate) attempts: u64,
    done: oneshot::Sender<Result<Response<C>>>,
    guard: InFlightGuard,
}

impl<C> Request<C> {
    pub(crate) fn new(component: C, uri: Url, guard: InFlightGuard) -> (Self, Enrichment<C>) {
        let (done, rx) = oneshot::channel();
        let request = Self {
            component,
            uri,
            attempts: 0,
            done,
            guard,
        };
        (request, Enrichment::pending(rx))
    }

    /// Resolve the caller's future with the given status, handing the
    /// component back. The in-flight guard is released only after the result
    /// is visible to the caller.
    pub(crate) fn finish(self, status: Status) {
        let Self {
            component,
            done,
            guard,
            ..
        } = self;
        // The caller may have dropped its future; that's fine.
        let _ = done.send(Ok(Response::new(component, status)));
        drop(guard);
    }
}

/// Future returned by [`Client::submit`](crate::Client::submit).
///
/// Resolves once the request reaches a terminal state. Cache hits resolve
/// before `submit` even returns; [`Enrichment::is_ready`] reports that case.
#[derive(Debug)]
pub struct Enrichment<C> {
    inner: Inner<C>,
}

#[derive(Debug)]
enum Inner<C> {
    Ready(Option<Result<Response<C>>>),
    Pending(oneshot::Receiver<Result<Response<C>>>),
}

// Enrichment never relies on pinning its contents in place: `Ready` holds a
// plain `Option` taken by value and `Pending` holds an already-`Unpin`
// `oneshot::Receiver`, so it is safe to be `Unpin` regardless of `C`.
impl<C> Unpin for Enrichment<C> {}

impl<C> Enrichment<C> {
    pub(crate) fn ready(outcome: Response<C>) -> Self {
        Self {
            inner: Inner::Ready(Some(Ok(outcome))),
        }
    }

    const fn pending(rx: oneshot::Receiver<Result<Response<C>>>) -> Self {
        Self {
            inner: Inner::Pending(rx),
        }
    }

    /// Returns `true` if the request was answered synchronously (from the
    /// cache or by submit-time validation) and awaiting cannot block.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self.inner, Inner::Ready(_))
    }
}

impl<C> Future for Enrichment<C> {
    type Output = Result<Response<C>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            Inner::Ready(outcome) => {
                let outcome = outcome.take().expect("enrichment polled after completion");
                Poll::Ready(outcome)
            }
            Inner::Pending(rx) => Pin::new(rx).poll(cx).map(|received| match received {
                Ok(outcome) => outcome,
                // The sending half only disappears without an answer when the
                // client is dropped with the request still pending.
                Err(_) => Err(ErrorKind::Shutdown),
            }),
        }
    }
}

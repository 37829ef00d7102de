//! The local content store consulted before any network round trip.
//!
//! A store entry for a URL is in one of three states: a payload (the service
//! answered with a body before), a negative marker (the service confirmed the
//! resource absent), or missing (never observed). Both hit states suppress
//! the network request entirely; a negative marker in particular keeps a
//! known-404 from being fetched again and again across runs.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::MemoryCache;

use thiserror::Error;
use url::Url;

/// Signals a [`ContentHandler`] lookup can come back with instead of content.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ContentError {
    /// The resource is recorded as absent upstream (negative entry)
    #[error("Resource is recorded as absent")]
    Absent,

    /// The store has never seen this URL
    #[error("Not in the content store")]
    Miss,

    /// The backing store failed
    #[error("Content store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// URL-keyed content store shared between the request manager and the rest
/// of the SBOM pipeline.
///
/// Implementations must be safe to call from many tasks at once. Lookups are
/// synchronous by design: the fast path of
/// [`Client::submit`](crate::Client::submit) consults the store inline and
/// must not await.
pub trait ContentHandler: Send + Sync {
    /// Look up the stored body for `url`.
    ///
    /// # Errors
    ///
    /// - [`ContentError::Absent`] for a negative entry
    /// - [`ContentError::Miss`] when the URL was never observed
    /// - [`ContentError::Io`] when the backing store fails
    fn content(&self, url: &Url) -> Result<String, ContentError>;

    /// Record an observation for `url`: a body, or `None` for a confirmed
    /// absent resource.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Io`] when the entry cannot be persisted.
    fn store(&self, url: &Url, payload: Option<&str>) -> Result<(), ContentError>;
}

impl std::fmt::Debug for dyn ContentHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentHandler")
    }
}

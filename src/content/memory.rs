use dashmap::DashMap;
use url::Url;

use super::{ContentError, ContentHandler};

/// Volatile, in-process content store.
///
/// Entries live for the lifetime of the value. Useful for one-shot pipeline
/// runs and as a deterministic store in tests; use [`DiskCache`] when entries
/// should survive the process.
///
/// [`DiskCache`]: super::DiskCache
#[derive(Debug, Default)]
pub struct MemoryCache {
    /// `None` marks a confirmed-absent resource
    entries: DashMap<Url, Option<String>>,
}

impl MemoryCache {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, negative markers included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been stored yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContentHandler for MemoryCache {
    fn content(&self, url: &Url) -> Result<String, ContentError> {
        match self.entries.get(url) {
            Some(entry) => match entry.value() {
                Some(body) => Ok(body.clone()),
                None => Err(ContentError::Absent),
            },
            None => Err(ContentError::Miss),
        }
    }

    fn store(&self, url: &Url, payload: Option<&str>) -> Result<(), ContentError> {
        self.entries
            .insert(url.clone(), payload.map(str::to_owned));
        Ok(())
    }
}

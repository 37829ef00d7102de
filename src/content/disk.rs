use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use url::Url;

use super::{ContentError, ContentHandler};

/// Extension for stored response bodies
const BODY_EXT: &str = "json";
/// Extension for negative markers (resource confirmed absent upstream)
const MARKER_EXT: &str = "missing";

/// Persistent content store: one file per URL in a flat directory, fronted by
/// an in-process map so repeat lookups skip the filesystem.
///
/// Positive entries are stored as `<encoded-url>.json`, negative entries as
/// an empty `<encoded-url>.missing` marker. The encoding keeps file names
/// readable while staying portable across filesystems.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
    overlay: DashMap<Url, Option<String>>,
}

impl DiskCache {
    /// Open (and create, if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            overlay: DashMap::new(),
        })
    }

    /// The directory entries are stored under
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn body_path(&self, url: &Url) -> PathBuf {
        self.dir.join(format!("{}.{BODY_EXT}", encode(url.as_str())))
    }

    fn marker_path(&self, url: &Url) -> PathBuf {
        self.dir
            .join(format!("{}.{MARKER_EXT}", encode(url.as_str())))
    }
}

impl ContentHandler for DiskCache {
    fn content(&self, url: &Url) -> Result<String, ContentError> {
        if let Some(entry) = self.overlay.get(url) {
            return match entry.value() {
                Some(body) => Ok(body.clone()),
                None => Err(ContentError::Absent),
            };
        }

        match fs::read_to_string(self.body_path(url)) {
            Ok(body) => {
                self.overlay.insert(url.clone(), Some(body.clone()));
                Ok(body)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.marker_path(url).exists() {
                    self.overlay.insert(url.clone(), None);
                    Err(ContentError::Absent)
                } else {
                    Err(ContentError::Miss)
                }
            }
            Err(e) => Err(ContentError::Io(e)),
        }
    }

    fn store(&self, url: &Url, payload: Option<&str>) -> Result<(), ContentError> {
        match payload {
            Some(body) => {
                fs::write(self.body_path(url), body)?;
                // A body supersedes an earlier negative observation
                let _ = fs::remove_file(self.marker_path(url));
            }
            None => {
                fs::write(self.marker_path(url), "")?;
                let _ = fs::remove_file(self.body_path(url));
            }
        }
        self.overlay.insert(url.clone(), payload.map(str::to_owned));
        Ok(())
    }
}

/// Encode a URL into a safe flat file name. Alphanumerics and `.`, `_`, `-`
/// pass through; every other byte becomes `%XX`.
fn encode(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    for byte in url.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                encoded.push(byte as char);
            }
            _ => {
                // Infallible for String
                let _ = write!(encoded, "%{byte:02X}");
            }
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_encode_is_flat_and_reversible_enough() {
        let encoded = encode("https://api.example/definitions/maven/a/b/1.0");
        assert!(!encoded.contains('/'));
        assert_eq!(
            encoded,
            "https%3A%2F%2Fapi.example%2Fdefinitions%2Fmaven%2Fa%2Fb%2F1.0"
        );
    }

    #[test]
    fn test_positive_entry_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = url("https://api.example/definitions/maven/a/b/1.0");

        let cache = DiskCache::new(dir.path()).unwrap();
        cache.store(&url, Some(r#"{"licensed":{}}"#)).unwrap();

        let reopened = DiskCache::new(dir.path()).unwrap();
        assert_eq!(reopened.content(&url).unwrap(), r#"{"licensed":{}}"#);
    }

    #[test]
    fn test_negative_marker_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = url("https://api.example/definitions/maven/a/b/1.0");

        let cache = DiskCache::new(dir.path()).unwrap();
        cache.store(&url, None).unwrap();

        let reopened = DiskCache::new(dir.path()).unwrap();
        assert!(matches!(reopened.content(&url), Err(ContentError::Absent)));
    }

    #[test]
    fn test_unknown_url_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();
        assert!(matches!(
            cache.content(&url("https://api.example/never")),
            Err(ContentError::Miss)
        ));
    }

    #[test]
    fn test_body_supersedes_marker_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let url = url("https://api.example/definitions/maven/a/b/1.0");

        let cache = DiskCache::new(dir.path()).unwrap();
        cache.store(&url, None).unwrap();
        cache.store(&url, Some("body")).unwrap();

        let reopened = DiskCache::new(dir.path()).unwrap();
        assert_eq!(reopened.content(&url).unwrap(), "body");
    }
}

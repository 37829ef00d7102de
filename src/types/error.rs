use http::StatusCode;
use thiserror::Error;
use url::Url;

/// Kinds of terminal request errors.
/// Note: The error messages can change over time, so don't match on the output
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Network error while handling request.
    /// This does not include erroneous status codes, `RejectedStatusCode` will be used in that case.
    #[error("Network error")]
    NetworkRequest(#[source] reqwest::Error),

    /// Cannot read the body of the received response
    #[error("Error reading response body: {0}")]
    ReadResponseBody(#[source] reqwest::Error),

    /// The network client required for making requests cannot be created
    #[error("Error creating request client: {0}")]
    BuildRequestClient(#[source] reqwest::Error),

    /// The server kept answering with a non-success status code
    #[error("Rejected status code: {0}")]
    RejectedStatusCode(StatusCode),

    /// Only absolute `http`/`https` URLs can be fetched
    #[error("Unsupported URL scheme in `{0}`")]
    UnsupportedScheme(Url),

    /// The client was torn down before the request completed
    #[error("Client was shut down before the request completed")]
    Shutdown,
}

/// The crate-wide result type
pub type Result<T> = std::result::Result<T, ErrorKind>;

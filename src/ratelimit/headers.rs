//! Parsing of the rate-limit headers the definitions service sends back.
//! The `x-ratelimit-*` family is not standardised (there is an
//! [IETF draft](https://datatracker.ietf.org/doc/draft-ietf-httpapi-ratelimit-headers/)),
//! so parsing stays deliberately small and defensive.

use std::time::{Duration, SystemTime};

use http::{HeaderMap, HeaderValue};
use thiserror::Error;

pub(crate) const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub(crate) const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub(crate) const RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum RetryAfterParseError {
    #[error("Unable to parse value '{0}'")]
    ValueError(String),

    #[error("Header value contains invalid chars")]
    HeaderValueError,
}

/// Parse the "Retry-After" header as specified per
/// [RFC 7231 section 7.1.3](https://www.rfc-editor.org/rfc/rfc7231#section-7.1.3):
/// either delay-seconds or an HTTP-date.
pub(crate) fn parse_retry_after(value: &HeaderValue) -> Result<Duration, RetryAfterParseError> {
    let value = value
        .to_str()
        .map_err(|_| RetryAfterParseError::HeaderValueError)?;

    value.parse::<u64>().map(Duration::from_secs).or_else(|_| {
        httpdate::parse_http_date(value)
            .map(|date| {
                date.duration_since(SystemTime::now())
                    // a date in the past means "retry now"
                    .unwrap_or(Duration::ZERO)
            })
            .map_err(|_| RetryAfterParseError::ValueError(value.into()))
    })
}

/// Read a numeric header field. A present but unparseable value is logged
/// and treated as absent, so a garbled header never clobbers tracked state.
pub(crate) fn parse_numeric_header(headers: &HeaderMap, name: &str) -> Option<i64> {
    let value = headers.get(name)?;
    match value.to_str().ok().and_then(|v| v.parse::<i64>().ok()) {
        Some(number) if number >= 0 => Some(number),
        _ => {
            log::warn!("Invalid {name} header: {value:?}");
            None
        }
    }
}

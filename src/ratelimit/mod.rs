//! Tracking of the quota the definitions service declares through response
//! headers.
//!
//! The tracker holds the last observed value of three fields: the declared
//! limit, the remaining budget, and the instant the budget resets. Workers
//! feed every response through [`RateLimitTracker::observe`]; only the
//! coordinator reads the state to decide admission. Each field is updated
//! atomically on its own; a composite read may mix observations from two
//! responses, which is fine because the coordinator only acts on `remaining`
//! and treats the reset instant as advisory.

mod headers;

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use http::HeaderMap;

pub(crate) use headers::parse_retry_after;
use headers::{LIMIT_HEADER, REMAINING_HEADER, RESET_HEADER, parse_numeric_header};

/// Sentinel for "no observation yet"
pub(crate) const UNKNOWN: i64 = -1;

/// Last-observed rate-limit state, shared between workers and coordinator.
#[derive(Debug)]
pub struct RateLimitTracker {
    /// Declared request budget per window; `-1` until first observed
    limit: AtomicI64,
    /// Requests left in the current window; `-1` until first observed
    remaining: AtomicI64,
    /// Window reset instant in milliseconds since the Unix epoch; `0` = none
    reset_at_ms: AtomicU64,
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimitTracker {
    /// Create a tracker with everything unknown.
    #[must_use]
    pub fn new() -> Self {
        Self {
            limit: AtomicI64::new(UNKNOWN),
            remaining: AtomicI64::new(UNKNOWN),
            reset_at_ms: AtomicU64::new(0),
        }
    }

    /// Fold one response's headers into the tracked state, last writer wins.
    ///
    /// The reset instant is only consulted when the same response reports the
    /// budget as exhausted; servers routinely send stale reset values
    /// alongside a healthy `remaining`.
    pub(crate) fn observe(&self, headers: &HeaderMap) {
        if let Some(limit) = parse_numeric_header(headers, LIMIT_HEADER) {
            self.limit.store(limit, Ordering::Relaxed);
            log::debug!("Rate limit: {limit}");
        }

        if let Some(remaining) = parse_numeric_header(headers, REMAINING_HEADER) {
            self.remaining.store(remaining, Ordering::Relaxed);
            log::debug!(
                "Rate limit remaining: {remaining}/{}",
                self.limit.load(Ordering::Relaxed)
            );
            if remaining == 0
                && let Some(reset_epoch_secs) = parse_numeric_header(headers, RESET_HEADER)
            {
                #[allow(clippy::cast_sign_loss)]
                self.reset_at_ms
                    .store(reset_epoch_secs as u64 * 1000, Ordering::Relaxed);
            }
        }
    }

    /// Record a hard server verdict (429): the budget is spent no matter what
    /// earlier headers said, and `retry_after` tells us when to come back.
    pub(crate) fn exhaust(&self, retry_after: Option<Duration>) {
        self.remaining.store(0, Ordering::Relaxed);
        if let Some(delay) = retry_after {
            let reset = SystemTime::now() + delay;
            self.reset_at_ms
                .store(epoch_millis(reset), Ordering::Relaxed);
        }
    }

    /// Drop the remaining-budget observation so the next response
    /// re-establishes ground truth. Called after waiting out a reset.
    pub(crate) fn forget_remaining(&self) {
        self.remaining.store(UNKNOWN, Ordering::Relaxed);
    }

    /// Composite read for admission decisions: the remaining budget and the
    /// reset instant, if one is known.
    pub(crate) fn admission(&self) -> (i64, Option<SystemTime>) {
        let remaining = self.remaining.load(Ordering::Relaxed);
        let reset_at_ms = self.reset_at_ms.load(Ordering::Relaxed);
        let reset_at = (reset_at_ms > 0).then(|| UNIX_EPOCH + Duration::from_millis(reset_at_ms));
        (remaining, reset_at)
    }

    /// Declared request budget, if the service has reported one yet
    #[must_use]
    pub fn limit(&self) -> Option<i64> {
        let limit = self.limit.load(Ordering::Relaxed);
        (limit != UNKNOWN).then_some(limit)
    }

    /// Requests left in the current window, if known
    #[must_use]
    pub fn remaining(&self) -> Option<i64> {
        let remaining = self.remaining.load(Ordering::Relaxed);
        (remaining != UNKNOWN).then_some(remaining)
    }

    /// Instant at which the current window resets, if known
    #[must_use]
    pub fn reset_at(&self) -> Option<SystemTime> {
        self.admission().1
    }
}

fn epoch_millis(instant: SystemTime) -> u64 {
    instant
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

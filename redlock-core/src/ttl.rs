//! TTL normalization
//!
//! A lock carries two horizons: `min_ttl`, the guard period during which the
//! id cannot be locked again even after release, and `max_ttl`, the native
//! expiry that bounds how long an unreleased lock can live.

use crate::error::{LockError, LockResult};
use std::time::Duration;

/// A validated pair of lock horizons.
///
/// Invariant: `max_ttl >= min_ttl` and `max_ttl` is at least one millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTtl {
    min_ttl: Duration,
    max_ttl: Duration,
}

impl LockTtl {
    /// Normalize a TTL pair.
    ///
    /// A zero (or sub-millisecond) `max_ttl` is rejected rather than replaced
    /// by a default. A `min_ttl` longer than `max_ttl` raises `max_ttl`, so the
    /// key can never expire while its guard period is still running.
    pub fn new(min_ttl: Duration, max_ttl: Duration) -> LockResult<Self> {
        if max_ttl.as_millis() == 0 {
            return Err(LockError::invalid_ttl(format!(
                "max ttl must be at least 1ms, got {:?}",
                max_ttl
            )));
        }

        Ok(Self {
            min_ttl,
            max_ttl: max_ttl.max(min_ttl),
        })
    }

    /// Normalize a TTL pair given in signed seconds.
    ///
    /// Negative `min_secs` is clamped to zero; `max_secs <= 0` is rejected.
    pub fn from_secs(min_secs: i64, max_secs: i64) -> LockResult<Self> {
        if max_secs <= 0 {
            return Err(LockError::invalid_ttl(format!(
                "max ttl must be positive, got {}s",
                max_secs
            )));
        }

        Self::new(
            Duration::from_secs(min_secs.max(0) as u64),
            Duration::from_secs(max_secs as u64),
        )
    }

    /// Guard period.
    pub fn min_ttl(&self) -> Duration {
        self.min_ttl
    }

    /// Native expiry of a freshly created lock.
    pub fn max_ttl(&self) -> Duration {
        self.max_ttl
    }

    /// Native expiry in milliseconds, as sent with `PX`.
    pub fn max_ttl_millis(&self) -> i64 {
        i64::try_from(self.max_ttl.as_millis()).unwrap_or(i64::MAX)
    }

    /// Unix second before which a lock taken at `now_millis` may not be
    /// taken again.
    ///
    /// A non-zero guard is rounded up to the next whole second, so the id
    /// stays guarded for at least `min_ttl` and at most one second longer.
    /// A zero guard ends at the current second.
    pub fn not_before(&self, now_millis: i64) -> i64 {
        let min_millis = i64::try_from(self.min_ttl.as_millis()).unwrap_or(i64::MAX);
        if min_millis == 0 {
            return now_millis.div_euclid(1000);
        }

        let guard_end = now_millis.saturating_add(min_millis);
        let secs = guard_end.div_euclid(1000);
        if guard_end.rem_euclid(1000) == 0 {
            secs
        } else {
            secs + 1
        }
    }
}

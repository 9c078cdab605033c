//! Lock storage backends
//!
//! This module provides the stores a [`crate::Locker`] can run against:
//!
//! - **Memory**: In-memory storage using DashMap (single process, tests)
//! - **Redis**: Distributed storage shared by every process that locks

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use self::memory::MemoryLockStore;
#[cfg(feature = "redis")]
pub use self::redis::{RELEASE_SCRIPT, RedisLockStore, ReleaseStrategy};

use crate::error::LockResult;
use async_trait::async_trait;
use std::time::Duration;

/// Trait for lock storage backends
///
/// Both operations must be atomic with respect to every other client of
/// the store. The store holds all lock state; implementations keep no
/// per-lock data of their own.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Create `key` holding `not_before` with native expiry `ttl`, only if
    /// the key is absent. Returns whether the key was created.
    async fn create_if_absent(&self, key: &str, not_before: i64, ttl: Duration)
    -> LockResult<bool>;

    /// Release protocol, evaluated as one indivisible step:
    ///
    /// - key absent: return `-1`
    /// - `not_before - now > 0`: shorten the expiry to that many seconds
    ///   (never lengthen it) and return it
    /// - otherwise: delete the key and return `0`
    async fn release(&self, key: &str, now: i64) -> LockResult<i64>;

    /// Get store type name for debugging
    fn store_type(&self) -> &'static str;
}

/// Step taken by the release protocol on one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseAction {
    /// Nothing stored
    Missing,
    /// Guard running and the expiry already ends no later than it
    Keep { remaining: i64 },
    /// Guard running; cut the expiry to `remaining` seconds
    Shorten { remaining: i64 },
    /// Guard over; delete the key
    Delete,
}

impl ReleaseAction {
    /// Decide what releasing a key does.
    ///
    /// `pttl_millis` follows Redis `PTTL`: `-1` for a key without expiry,
    /// `-2` for a key that is gone.
    pub(crate) fn decide(not_before: Option<i64>, now: i64, pttl_millis: i64) -> Self {
        let Some(not_before) = not_before else {
            return Self::Missing;
        };
        if pttl_millis == -2 {
            return Self::Missing;
        }

        let remaining = not_before.saturating_sub(now);
        if remaining <= 0 {
            Self::Delete
        } else if pttl_millis < 0 || remaining.saturating_mul(1000) < pttl_millis {
            Self::Shorten { remaining }
        } else {
            Self::Keep { remaining }
        }
    }

    /// Wire code answered to the caller
    pub(crate) fn code(&self) -> i64 {
        match self {
            Self::Missing => -1,
            Self::Delete => 0,
            Self::Keep { remaining } | Self::Shorten { remaining } => *remaining,
        }
    }
}

//! Two-horizon distributed locks
//!
//! A lock id, once taken, stays untakeable for its guard period (`min_ttl`)
//! even if released early, and disappears on its own after `max_ttl` if it
//! is never released.

use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::error::{LockError, LockResult};
use crate::store::LockStore;
use crate::ttl::LockTtl;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Result of releasing a lock id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// No lock existed: never taken, already released or expired
    Expired,
    /// Guard period had elapsed; the id is free right away
    Released,
    /// Guard period still running for this many seconds. The lock's expiry
    /// was cut down to that horizon, after which the id frees itself.
    StillGuarded(u64),
}

impl ReleaseOutcome {
    /// Wire code: `-1`, `0` or the remaining seconds
    pub fn code(&self) -> i64 {
        match self {
            Self::Expired => -1,
            Self::Released => 0,
            Self::StillGuarded(remaining) => i64::try_from(*remaining).unwrap_or(i64::MAX),
        }
    }

    /// Decode a wire code returned by a store
    pub fn from_code(code: i64) -> LockResult<Self> {
        match code {
            -1 => Ok(Self::Expired),
            0 => Ok(Self::Released),
            remaining if remaining > 0 => Ok(Self::StillGuarded(remaining as u64)),
            other => Err(LockError::UnexpectedReply(other)),
        }
    }

    /// Whether the id can be locked again right now
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::StillGuarded(_))
    }

    /// Time until the id becomes lockable again
    pub fn remaining(&self) -> Duration {
        match self {
            Self::StillGuarded(remaining) => Duration::from_secs(*remaining),
            _ => Duration::ZERO,
        }
    }
}

impl fmt::Display for ReleaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => write!(f, "expired"),
            Self::Released => write!(f, "released"),
            Self::StillGuarded(remaining) => write!(f, "guarded for {}s", remaining),
        }
    }
}

/// Lock client
///
/// Stateless: every call is one round trip to the store, so a single
/// `Locker` can be shared across tasks. There is no retry loop; a `false`
/// from [`Locker::lock_with_time`] is for the caller to act on.
pub struct Locker {
    store: Arc<dyn LockStore>,
    clock: Arc<dyn Clock>,
    config: LockConfig,
}

impl Locker {
    /// Create a new locker on the given store with default configuration
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            config: LockConfig::default(),
        }
    }

    /// Create a locker backed by Redis
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use redlock_core::Locker;
    /// use redlock_redis::{RedisConfig, RedisService};
    /// use std::sync::Arc;
    /// use std::time::Duration;
    ///
    /// let redis = Arc::new(RedisService::new(RedisConfig::from_env().build()).await?);
    /// let locker = Locker::redis(redis);
    ///
    /// if locker
    ///     .lock_with_time("report:daily", Duration::from_secs(10), Duration::from_secs(30))
    ///     .await?
    /// {
    ///     // critical section
    ///     locker.unlock("report:daily").await?;
    /// }
    /// ```
    #[cfg(feature = "redis")]
    pub fn redis(redis: Arc<redlock_redis::RedisService>) -> Self {
        Self::new(Arc::new(crate::store::RedisLockStore::new(redis)))
    }

    /// Use the given configuration
    pub fn with_config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    /// Use the given clock for not-before stamps and release comparisons
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Get the store type name
    pub fn store_type(&self) -> &'static str {
        self.store.store_type()
    }

    /// Lock `id` with the configured default TTLs
    pub async fn lock(&self, id: &str) -> LockResult<bool> {
        self.config.validate()?;
        let ttl = self.config.default_ttl()?;
        self.lock_with_ttl(id, ttl).await
    }

    // Configs built by hand or deserialized never went through `build()`.
    fn key(&self, id: &str) -> LockResult<String> {
        self.config.check_prefix()?;
        Ok(self.config.key(id))
    }

    /// Lock `id` so that it cannot be locked again for `min_ttl`, whether or
    /// not it is released, and frees itself after `max_ttl` at the latest.
    ///
    /// The guard is stored as a Unix second rounded up, so it can outlast
    /// `min_ttl` by up to a second but never ends early. Returns `false`
    /// when the id is currently locked, by anyone.
    pub async fn lock_with_time(
        &self,
        id: &str,
        min_ttl: Duration,
        max_ttl: Duration,
    ) -> LockResult<bool> {
        let ttl = LockTtl::new(min_ttl, max_ttl)?;
        self.lock_with_ttl(id, ttl).await
    }

    /// Lock `id` with an already normalized TTL pair
    pub async fn lock_with_ttl(&self, id: &str, ttl: LockTtl) -> LockResult<bool> {
        let key = self.key(id)?;
        let not_before = ttl.not_before(self.clock.now_millis());

        let acquired = self
            .store
            .create_if_absent(&key, not_before, ttl.max_ttl())
            .await?;

        if acquired {
            info!(key = %key, not_before = not_before, max_ttl = ?ttl.max_ttl(), "Acquired lock");
        } else {
            debug!(key = %key, "Failed to acquire lock (already held)");
        }

        Ok(acquired)
    }

    /// Release `id`
    ///
    /// Safe to call without holding the lock and safe to repeat.
    pub async fn unlock(&self, id: &str) -> LockResult<ReleaseOutcome> {
        let key = self.key(id)?;
        let code = self.store.release(&key, self.clock.now_unix()).await?;

        let outcome = ReleaseOutcome::from_code(code).inspect_err(|_| {
            warn!(key = %key, code = code, "Store answered release with an unknown code");
        })?;

        debug!(key = %key, outcome = %outcome, "Released lock");
        Ok(outcome)
    }
}

impl fmt::Debug for Locker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locker")
            .field("store", &self.store.store_type())
            .field("clock", &self.clock)
            .field("config", &self.config)
            .finish()
    }
}

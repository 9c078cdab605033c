//! Redis lock store
//!
//! Acquisition is a single `SET key value NX PX ttl`. Release runs as a Lua
//! script so the read, the comparison and the shorten-or-delete happen as one
//! step; servers with scripting disabled can use an optimistic
//! `WATCH`/`MULTI` loop instead. Requires the `redis` feature.

use crate::error::{LockError, LockResult};
use crate::store::{LockStore, ReleaseAction};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redlock_redis::RedisService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Release protocol evaluated by Redis.
///
/// `KEYS[1]` is the lock key, `ARGV[1]` the caller's current Unix second.
/// Takes the same steps as the optimistic strategy: missing `-1`, guard over
/// `DEL` and `0`, guard running `EXPIRE` (only when shorter) and the
/// remaining seconds.
pub const RELEASE_SCRIPT: &str = r#"
local value = redis.call('GET', KEYS[1])
if not value then
    return -1
end

local not_before = tonumber(value)
if not not_before then
    return redis.error_reply('ERR lock value is not a timestamp')
end

local remaining = not_before - tonumber(ARGV[1])
if remaining > 0 then
    local pttl = redis.call('PTTL', KEYS[1])
    if pttl < 0 or remaining * 1000 < pttl then
        redis.call('EXPIRE', KEYS[1], remaining)
    end
    return remaining
end

redis.call('DEL', KEYS[1])
return 0
"#;

/// How the release protocol is made atomic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseStrategy {
    /// Server-side Lua script (EVALSHA with EVAL fallback)
    #[default]
    Script,
    /// `WATCH`/`MULTI`/`EXEC` on a dedicated connection, retried when the
    /// key changes between the read and the commit
    Optimistic {
        /// Commit attempts before giving up with [`LockError::Contention`]
        max_attempts: u32,
    },
}

/// Redis-backed lock store
///
/// Shares the caller's connection pool; every round trip is bounded by the
/// pool's configured command timeout.
pub struct RedisLockStore {
    redis: Arc<RedisService>,
    strategy: ReleaseStrategy,
    script: redis::Script,
}

impl RedisLockStore {
    /// Create a new Redis store on an existing service
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use redlock_core::RedisLockStore;
    /// use redlock_redis::{RedisConfig, RedisService};
    /// use std::sync::Arc;
    ///
    /// let redis = Arc::new(RedisService::new(RedisConfig::from_env().build()).await?);
    /// let store = RedisLockStore::new(redis);
    /// ```
    pub fn new(redis: Arc<RedisService>) -> Self {
        Self {
            redis,
            strategy: ReleaseStrategy::default(),
            script: redis::Script::new(RELEASE_SCRIPT),
        }
    }

    /// Select the release strategy
    pub fn with_strategy(mut self, strategy: ReleaseStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Current release strategy
    pub fn strategy(&self) -> ReleaseStrategy {
        self.strategy
    }

    /// Underlying Redis service
    pub fn service(&self) -> &Arc<RedisService> {
        &self.redis
    }

    async fn bounded<T>(&self, op: impl Future<Output = LockResult<T>>) -> LockResult<T> {
        tokio::time::timeout(self.redis.config().command_timeout, op)
            .await
            .map_err(|_| LockError::Timeout)?
    }

    async fn release_with_script(&self, key: &str, now: i64) -> LockResult<i64> {
        let mut conn = self.redis.get().await?;
        let code: i64 = self
            .script
            .key(key)
            .arg(now)
            .invoke_async(&mut *conn)
            .await?;
        Ok(code)
    }

    async fn release_optimistic(&self, key: &str, now: i64, max_attempts: u32) -> LockResult<i64> {
        // WATCH state lives on the connection, so it must not be shared.
        let mut txn = WatchedRelease {
            conn: self.redis.get_dedicated().await?,
        };
        release_with_retries(&mut txn, key, now, max_attempts).await
    }
}

/// One optimistic release round
#[async_trait]
trait ReleaseAttempt: Send {
    /// Read and commit once; `None` when a concurrent write aborted the commit
    async fn attempt(&mut self, key: &str, now: i64) -> LockResult<Option<i64>>;
}

/// Run rounds until one commits, at most `max_attempts` (and at least one)
async fn release_with_retries(
    txn: &mut dyn ReleaseAttempt,
    key: &str,
    now: i64,
    max_attempts: u32,
) -> LockResult<i64> {
    let max_attempts = max_attempts.max(1);

    for attempt in 1..=max_attempts {
        if let Some(code) = txn.attempt(key, now).await? {
            return Ok(code);
        }
        warn!(key = %key, attempt = attempt, "Lock changed during optimistic release, retrying");
    }

    Err(LockError::Contention(format!(
        "{} changed on every one of {} release attempts",
        key, max_attempts
    )))
}

/// `WATCH`/`MULTI`/`EXEC` release on a connection of its own
struct WatchedRelease {
    conn: MultiplexedConnection,
}

impl WatchedRelease {
    /// Watch `key` and decide the release step from its current state
    async fn watch(&mut self, key: &str, now: i64) -> LockResult<ReleaseAction> {
        let _: () = redis::cmd("WATCH").arg(key).query_async(&mut self.conn).await?;

        let (value, pttl): (Option<String>, i64) = redis::pipe()
            .get(key)
            .pttl(key)
            .query_async(&mut self.conn)
            .await?;

        let not_before = value
            .map(|value| {
                value.parse::<i64>().map_err(|_| {
                    LockError::store(format!("lock value '{}' of {} is not a timestamp", value, key))
                })
            })
            .transpose()?;

        Ok(ReleaseAction::decide(not_before, now, pttl))
    }

    /// Apply `action` in a transaction; `None` when `EXEC` was aborted
    async fn commit(&mut self, key: &str, action: ReleaseAction) -> LockResult<Option<i64>> {
        let mut pipe = redis::pipe();
        pipe.atomic();

        match action {
            ReleaseAction::Missing | ReleaseAction::Keep { .. } => {
                let _: () = redis::cmd("UNWATCH").query_async(&mut self.conn).await?;
                return Ok(Some(action.code()));
            }
            ReleaseAction::Shorten { remaining } => {
                pipe.expire(key, remaining);
            }
            ReleaseAction::Delete => {
                pipe.del(key);
            }
        }

        let committed: Option<redis::Value> = pipe.query_async(&mut self.conn).await?;
        Ok(committed.map(|_| action.code()))
    }
}

#[async_trait]
impl ReleaseAttempt for WatchedRelease {
    async fn attempt(&mut self, key: &str, now: i64) -> LockResult<Option<i64>> {
        let action = self.watch(key, now).await?;
        self.commit(key, action).await
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn create_if_absent(
        &self,
        key: &str,
        not_before: i64,
        ttl: Duration,
    ) -> LockResult<bool> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        trace!(key = %key, not_before = not_before, ttl_ms = ttl_millis, "Redis SET NX PX");

        self.bounded(async {
            let mut conn = self.redis.get().await?;

            // Use SET NX PX for atomic acquire with TTL
            let result: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(not_before)
                .arg("NX") // Only set if not exists
                .arg("PX") // Set expiry in milliseconds
                .arg(ttl_millis)
                .query_async(&mut *conn)
                .await?;

            Ok(result.is_some())
        })
        .await
    }

    async fn release(&self, key: &str, now: i64) -> LockResult<i64> {
        trace!(key = %key, now = now, strategy = ?self.strategy, "Redis release");

        let code = match self.strategy {
            ReleaseStrategy::Script => self.bounded(self.release_with_script(key, now)).await?,
            ReleaseStrategy::Optimistic { max_attempts } => {
                self.bounded(self.release_optimistic(key, now, max_attempts))
                    .await?
            }
        };

        debug!(key = %key, code = code, "Redis release finished");
        Ok(code)
    }

    fn store_type(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisLockStore")
            .field("url", &self.redis.config().url)
            .field("strategy", &self.strategy)
            .finish()
    }
}

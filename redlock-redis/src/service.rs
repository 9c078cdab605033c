//! Shareable Redis service handle.

use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tracing::info;

use crate::{RedisConfig, RedisError, Result};

/// Redis service owning the connection pool.
///
/// Created once by the application and shared (usually behind an `Arc`)
/// by every lock store that talks to the same server.
pub struct RedisService {
    config: RedisConfig,
    pool: Pool<RedisConnectionManager>,
}

impl RedisService {
    /// Connect to the server described by `config`.
    ///
    /// The configuration is validated first; the pool is then built and
    /// checked with one `PING`, so a service that exists can reach Redis.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        config.validate()?;

        let manager = RedisConnectionManager::new(config.connection_url()?)
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .min_idle(config.min_idle)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .await
            .map_err(|e| RedisError::Pool(e.to_string()))?;

        let service = Self { config, pool };
        service.health_check().await?;

        info!(
            url = %service.config.url,
            pool_size = service.config.pool_size,
            command_timeout = ?service.config.command_timeout,
            "Lock store connected to Redis"
        );

        Ok(service)
    }

    /// Get the configuration.
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Get a connection from the pool.
    ///
    /// Dereferences to a [`MultiplexedConnection`]; it goes back to the pool
    /// when dropped.
    pub async fn get(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        Ok(self.pool.get().await?)
    }

    /// Get a dedicated connection (not from pool).
    ///
    /// Needed for `WATCH`, whose state is bound to a single connection.
    pub async fn get_dedicated(&self) -> Result<MultiplexedConnection> {
        let client = redis::Client::open(self.config.connection_url()?)
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))
    }

    /// Check if the connection is healthy.
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Get pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Check if a key exists.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get().await?;
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    /// Remaining native expiry of a key, `None` when the key is missing or
    /// has no expiry.
    pub async fn pttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.get().await?;
        let pttl: i64 = conn.pttl(key).await?;
        if pttl < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(pttl as u64)))
        }
    }

    /// Delete a key.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.get().await?;
        let deleted: u32 = conn.del(key).await?;
        Ok(deleted > 0)
    }
}

/// Connection pool statistics.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total connections.
    pub connections: u32,
    /// Idle connections.
    pub idle_connections: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn redis_url() -> String {
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
    }

    #[tokio::test]
    async fn test_new_rejects_invalid_config() {
        let config = RedisConfig::builder().url("memcached://localhost").build();
        let result = RedisService::new(config).await;
        assert!(matches!(result, Err(RedisError::Config(_))));
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_basic_operations() {
        let config = RedisConfig::builder().url(redis_url()).pool_size(2).build();
        let redis = RedisService::new(config).await.unwrap();

        redis.health_check().await.unwrap();
        assert!(redis.pool_stats().connections >= 1);

        let key = "redlock:service:test";
        let mut conn = redis.get().await.unwrap();
        let _: () = conn.set_ex(key, "1", 30).await.unwrap();
        drop(conn);

        assert!(redis.exists(key).await.unwrap());
        let pttl = redis.pttl(key).await.unwrap().unwrap();
        assert!(pttl <= Duration::from_secs(30));

        assert!(redis.delete(key).await.unwrap());
        assert!(!redis.exists(key).await.unwrap());
        assert_eq!(redis.pttl(key).await.unwrap(), None);
    }
}

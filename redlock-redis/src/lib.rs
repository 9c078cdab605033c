//! # redlock-redis
//!
//! Redis connection layer used by the redlock lock stores.
//!
//! ## Features
//!
//! - **Configuration**: builder and environment loading for server, auth, database and timeouts
//! - **Connection Pooling**: bb8-managed multiplexed connections
//! - **Service Handle**: one `RedisService` shared by every lock store
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use redlock_redis::{RedisConfig, RedisService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RedisConfig::builder()
//!         .url("redis://localhost:6379")
//!         .pool_size(10)
//!         .build();
//!
//!     let redis = Arc::new(RedisService::new(config).await?);
//!     redis.health_check().await?;
//!
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod service;

pub use config::{RedisConfig, RedisConfigBuilder};
pub use error::{RedisError, Result};
pub use service::{PoolStats, RedisService};

// Re-export redis crate for convenience
pub use redis;

//! # redlock-core
//!
//! Distributed locks with two horizons, arbitrated entirely by a shared store.
//!
//! ## Features
//!
//! - **Guard period** - a lock id cannot be taken again for `min_ttl`, even
//!   after an early release
//! - **Bounded lifetime** - an unreleased lock frees itself after `max_ttl`
//! - **Atomic release** - read, compare and shorten-or-delete in one Redis
//!   script (or an optimistic `WATCH` loop)
//! - **Pluggable stores** - Redis for multi-process use, DashMap in memory for
//!   a single process and tests
//! - **Injectable clock** - deterministic time in tests
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use redlock_core::*;
//! use redlock_redis::{RedisConfig, RedisService};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let redis = Arc::new(RedisService::new(RedisConfig::from_env().build()).await?);
//!     let locker = Locker::redis(redis);
//!
//!     // At most one run per 10 seconds; a crashed holder frees the id after 30.
//!     if locker
//!         .lock_with_time("report:daily", Duration::from_secs(10), Duration::from_secs(30))
//!         .await?
//!     {
//!         println!("Lock acquired, doing work...");
//!
//!         match locker.unlock("report:daily").await? {
//!             ReleaseOutcome::StillGuarded(secs) => println!("free again in {}s", secs),
//!             outcome => println!("{}", outcome),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Release codes
//!
//! | code | outcome | meaning |
//! |------|---------|---------|
//! | `-1` | [`ReleaseOutcome::Expired`] | no lock existed |
//! | `0` | [`ReleaseOutcome::Released`] | guard period over, id free now |
//! | `N` | [`ReleaseOutcome::StillGuarded`] | id frees itself in `N` seconds |
//!
//! ## Clocks
//!
//! The not-before stamp and the release comparison both use the client's
//! clock, while native expiry runs on the store's clock. Hosts sharing lock
//! ids must keep their clocks within about a second of each other.

pub mod clock;
pub mod config;
pub mod error;
pub mod lock;
pub mod store;
pub mod ttl;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LockConfig, LockConfigBuilder};
pub use error::{LockError, LockResult};
pub use lock::{Locker, ReleaseOutcome};
pub use store::{LockStore, MemoryLockStore};
pub use ttl::LockTtl;

#[cfg(feature = "redis")]
pub use store::{RELEASE_SCRIPT, RedisLockStore, ReleaseStrategy};

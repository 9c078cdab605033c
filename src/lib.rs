// redlock - two-horizon distributed locks on a shared key-value store
//
// A lock id stays untakeable for a guard period even after an early release,
// and frees itself after a maximum lifetime if its holder never releases it.

// Re-export core functionality
pub use redlock_core::*;

// Re-export the Redis connection layer
#[cfg(feature = "redis")]
pub use redlock_redis;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Clock, LockConfig, LockError, LockResult, LockStore, LockTtl, Locker, MemoryLockStore,
        ReleaseOutcome, SystemClock,
    };

    #[cfg(feature = "redis")]
    pub use crate::{RedisLockStore, ReleaseStrategy};

    #[cfg(feature = "redis")]
    pub use redlock_redis::{RedisConfig, RedisService};
}

//! Error types for lock operations

use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Lock errors
///
/// Two classes exist: configuration errors, raised before the store is
/// touched, and store errors, propagated from the backend as they occurred.
/// Losing a race for a held lock is not an error.
#[derive(Debug, Error)]
pub enum LockError {
    /// TTL pair that cannot be normalized
    #[error("Invalid lock TTL: {0}")]
    InvalidTtl(String),

    /// Invalid lock configuration
    #[error("Lock configuration error: {0}")]
    Config(String),

    /// Store error (memory, custom backends)
    #[error("Lock store error: {0}")]
    Store(String),

    /// Store round trip exceeded its time bound
    #[error("Lock store operation timed out")]
    Timeout,

    /// Release script answered with a code outside the protocol
    #[error("Unexpected release reply: {0}")]
    UnexpectedReply(i64),

    /// Optimistic release kept losing its WATCH
    #[error("Lock release contention: {0}")]
    Contention(String),

    /// Redis command error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Redis pool or connection error
    #[cfg(feature = "redis")]
    #[error("Redis connection error: {0}")]
    Connection(#[from] redlock_redis::RedisError),
}

impl LockError {
    /// Create a new TTL error
    pub fn invalid_ttl<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTtl(msg.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        Self::Store(msg.into())
    }

    /// Whether the caller supplied bad input; never worth retrying as-is
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidTtl(_) | Self::Config(_))
    }

    /// Whether the failure came from the store or the transport to it
    pub fn is_store_error(&self) -> bool {
        !self.is_config_error()
    }
}

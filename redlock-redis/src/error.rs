//! Redis error types.

use thiserror::Error;

/// Result type for Redis operations.
pub type Result<T> = std::result::Result<T, RedisError>;

/// Redis errors.
#[derive(Debug, Error)]
pub enum RedisError {
    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Pool error.
    #[error("Pool error: {0}")]
    Pool(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout error.
    #[error("Operation timed out")]
    Timeout,

    /// Underlying Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl<E> From<bb8::RunError<E>> for RedisError
where
    E: std::error::Error + 'static,
{
    fn from(err: bb8::RunError<E>) -> Self {
        match err {
            bb8::RunError::TimedOut => Self::Timeout,
            bb8::RunError::User(e) => Self::Pool(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_timeout_maps_to_timeout() {
        let err: RedisError = bb8::RunError::<std::io::Error>::TimedOut.into();
        assert!(matches!(err, RedisError::Timeout));

        let err: RedisError =
            bb8::RunError::User(std::io::Error::other("connection refused")).into();
        assert!(matches!(err, RedisError::Pool(msg) if msg.contains("refused")));
    }

    #[test]
    fn test_display() {
        let err = RedisError::Config("pool_size must be greater than zero".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: pool_size must be greater than zero"
        );
    }
}

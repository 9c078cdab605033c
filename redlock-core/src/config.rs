//! Lock configuration

use crate::error::{LockError, LockResult};
use crate::ttl::LockTtl;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lock configuration
///
/// Holds the key namespace and the TTL pair used by [`crate::Locker::lock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Prefix joined to every lock id as `{prefix}:{id}`
    #[serde(default)]
    pub key_prefix: Option<String>,
    /// Default guard period, `min_ttl_ms` when serialized
    #[serde(rename = "min_ttl_ms", with = "duration_millis", default)]
    pub min_ttl: Duration,
    /// Default maximum lifetime, `max_ttl_ms` when serialized
    #[serde(rename = "max_ttl_ms", with = "duration_millis", default = "default_max_ttl")]
    pub max_ttl: Duration,
}

fn default_max_ttl() -> Duration {
    Duration::from_secs(30)
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: None,
            min_ttl: Duration::ZERO,
            max_ttl: default_max_ttl(),
        }
    }
}

impl LockConfig {
    /// Create a builder
    pub fn builder() -> LockConfigBuilder {
        LockConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Reads `REDLOCK_KEY_PREFIX`, `REDLOCK_MIN_TTL_SECS` and
    /// `REDLOCK_MAX_TTL_SECS`. A negative minimum is clamped to zero; a
    /// non-positive maximum is kept so that `build()` rejects it.
    pub fn from_env() -> LockConfigBuilder {
        let mut builder = LockConfigBuilder::new();

        if let Ok(prefix) = std::env::var("REDLOCK_KEY_PREFIX") {
            builder = builder.key_prefix(prefix);
        }

        if let Ok(min) = std::env::var("REDLOCK_MIN_TTL_SECS")
            && let Ok(secs) = min.trim().parse::<i64>() {
                builder = builder.min_ttl(Duration::from_secs(secs.max(0) as u64));
            }

        if let Ok(max) = std::env::var("REDLOCK_MAX_TTL_SECS")
            && let Ok(secs) = max.trim().parse::<i64>() {
                builder = builder.max_ttl(Duration::from_secs(secs.max(0) as u64));
            }

        builder
    }

    /// Check the prefix and the default TTL pair
    pub fn validate(&self) -> LockResult<()> {
        self.check_prefix()?;
        self.default_ttl().map(|_| ())
    }

    pub(crate) fn check_prefix(&self) -> LockResult<()> {
        match self.key_prefix.as_deref() {
            Some("") => Err(LockError::config("key prefix must not be empty")),
            _ => Ok(()),
        }
    }

    /// Normalized default TTL pair
    pub fn default_ttl(&self) -> LockResult<LockTtl> {
        LockTtl::new(self.min_ttl, self.max_ttl)
    }

    /// Store key for a lock id
    pub fn key(&self, id: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, id),
            None => id.to_string(),
        }
    }
}

/// Builder for lock configuration
#[derive(Debug, Default)]
pub struct LockConfigBuilder {
    config: LockConfig,
}

impl LockConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: LockConfig::default(),
        }
    }

    /// Set the key prefix
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.key_prefix = Some(prefix.into());
        self
    }

    /// Set the default guard period
    pub fn min_ttl(mut self, ttl: Duration) -> Self {
        self.config.min_ttl = ttl;
        self
    }

    /// Set the default maximum lifetime
    pub fn max_ttl(mut self, ttl: Duration) -> Self {
        self.config.max_ttl = ttl;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> LockResult<LockConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

//! In-memory lock store
//!
//! Uses DashMap for thread-safe concurrent access. Each operation holds the
//! shard lock of its key for its whole read-modify-write, which gives the
//! same per-key atomicity Redis gives a script. Suitable for single-process
//! deployments and tests; for distributed deployments use the Redis store.

use crate::clock::{Clock, SystemClock};
use crate::error::{LockError, LockResult};
use crate::store::{LockStore, ReleaseAction};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct LockEntry {
    /// Unix second before which the id stays locked
    not_before: i64,
    /// Native expiry, epoch milliseconds
    expires_at: i64,
}

impl LockEntry {
    fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at
    }
}

/// In-memory lock store
pub struct MemoryLockStore {
    entries: DashMap<String, LockEntry>,
    clock: Arc<dyn Clock>,
}

impl MemoryLockStore {
    /// Create a new in-memory store on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a new in-memory store whose native expiry follows `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        debug!("Creating new in-memory lock store");
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Number of live (unexpired) locks
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// Whether no live lock exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining native expiry of a key, `None` if absent or expired
    pub fn pttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| Duration::from_millis((entry.expires_at - now) as u64))
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());
        debug!(removed = removed, "Purged expired locks");
        removed
    }
}

impl Default for MemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn create_if_absent(
        &self,
        key: &str,
        not_before: i64,
        ttl: Duration,
    ) -> LockResult<bool> {
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        if ttl_millis <= 0 {
            return Err(LockError::store("invalid expire time"));
        }

        let now = self.clock.now_millis();
        let fresh = LockEntry {
            not_before,
            expires_at: now.saturating_add(ttl_millis),
        };

        let created = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(fresh);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        };

        trace!(key = %key, not_before = not_before, created = created, "Memory create-if-absent");
        Ok(created)
    }

    async fn release(&self, key: &str, now: i64) -> LockResult<i64> {
        let now_millis = self.clock.now_millis();

        let code = match self.entries.entry(key.to_string()) {
            Entry::Vacant(_) => -1,
            Entry::Occupied(occupied) if occupied.get().is_expired(now_millis) => {
                occupied.remove();
                -1
            }
            Entry::Occupied(mut occupied) => {
                let entry = *occupied.get();
                let action =
                    ReleaseAction::decide(Some(entry.not_before), now, entry.expires_at - now_millis);
                match action {
                    ReleaseAction::Shorten { remaining } => {
                        occupied.get_mut().expires_at =
                            now_millis.saturating_add(remaining.saturating_mul(1000));
                    }
                    ReleaseAction::Delete => {
                        occupied.remove();
                    }
                    ReleaseAction::Keep { .. } | ReleaseAction::Missing => {}
                }
                action.code()
            }
        };

        trace!(key = %key, now = now, code = code, "Memory release");
        Ok(code)
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryLockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryLockStore")
            .field("entries", &self.entries.len())
            .field("clock", &self.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const START: i64 = 1_700_000_000;

    fn store() -> (MemoryLockStore, ManualClock) {
        let clock = ManualClock::at_unix(START);
        (MemoryLockStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn test_create_if_absent() {
        let (store, _clock) = store();

        assert!(store.create_if_absent("a", START + 10, Duration::from_secs(30)).await.unwrap());
        assert!(!store.create_if_absent("a", START + 10, Duration::from_secs(30)).await.unwrap());
        assert!(store.create_if_absent("b", START, Duration::from_secs(1)).await.unwrap());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_create_replaces_expired_entry() {
        let (store, clock) = store();

        assert!(store.create_if_absent("a", START, Duration::from_secs(1)).await.unwrap());
        clock.advance(Duration::from_millis(999));
        assert!(!store.create_if_absent("a", START, Duration::from_secs(1)).await.unwrap());
        clock.advance(Duration::from_millis(1));
        assert!(store.create_if_absent("a", START + 1, Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_ttl_is_rejected() {
        let (store, _clock) = store();
        let err = store.create_if_absent("a", START, Duration::ZERO).await.unwrap_err();
        assert!(err.is_store_error());
    }

    #[tokio::test]
    async fn test_release_missing_key() {
        let (store, _clock) = store();
        assert_eq!(store.release("missing", START).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_release_shortens_expiry() {
        let (store, clock) = store();
        store.create_if_absent("a", START + 10, Duration::from_secs(30)).await.unwrap();

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.release("a", START + 1).await.unwrap(), 9);
        assert_eq!(store.pttl("a"), Some(Duration::from_secs(9)));

        clock.advance(Duration::from_secs(9));
        assert_eq!(store.pttl("a"), None);
        assert_eq!(store.release("a", START + 10).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn test_release_never_lengthens_expiry() {
        let (store, clock) = store();
        // Guard period ends after the native expiry would.
        store.create_if_absent("a", START + 10, Duration::from_secs(5)).await.unwrap();

        clock.advance(Duration::from_secs(1));
        assert_eq!(store.release("a", START + 1).await.unwrap(), 9);
        assert_eq!(store.pttl("a"), Some(Duration::from_secs(4)));
    }

    #[tokio::test]
    async fn test_release_deletes_after_guard() {
        let (store, clock) = store();
        store.create_if_absent("a", START + 3, Duration::from_secs(30)).await.unwrap();

        clock.advance(Duration::from_secs(4));
        assert_eq!(store.release("a", START + 4).await.unwrap(), 0);
        assert_eq!(store.release("a", START + 4).await.unwrap(), -1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store();
        store.create_if_absent("short", START, Duration::from_secs(1)).await.unwrap();
        store.create_if_absent("long", START, Duration::from_secs(60)).await.unwrap();

        clock.advance(Duration::from_secs(2));
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.pttl("long").is_some());
    }

    #[test]
    fn test_store_type() {
        assert_eq!(MemoryLockStore::new().store_type(), "memory");
    }
}

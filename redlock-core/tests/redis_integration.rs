//! Integration tests against a live Redis server.
//!
//! These sleep in real time and are ignored by default. Run with:
//! `REDIS_URL=redis://localhost:6379 cargo test -p redlock-core -- --ignored`

#![cfg(feature = "redis")]

use futures::future::join_all;
use redlock_core::*;
use redlock_redis::{RedisConfig, RedisService};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

async fn service() -> Arc<RedisService> {
    let config = RedisConfig::builder()
        .url(redis_url())
        .pool_size(10)
        .connection_timeout(Duration::from_secs(10))
        .command_timeout(Duration::from_secs(30))
        .build();
    Arc::new(RedisService::new(config).await.unwrap())
}

fn lock_id() -> String {
    format!("lock:red-{}", Uuid::new_v4())
}

async fn run_table(locker: &Locker) {
    // (min, max, unlock_after, second_unlock_after, unlock_want, second_unlock_want)
    // A want of `None` means "any positive remaining".
    let ms = Duration::from_millis;
    let s = Duration::from_secs;
    let cases: [(Duration, Duration, Duration, Duration, Option<i64>, Option<i64>); 6] = [
        (s(10), s(30), s(1), s(4), None, None),
        (s(3), s(30), s(4), s(1), Some(0), Some(-1)),
        (s(2), s(3), s(5), s(1), Some(-1), Some(-1)),
        (s(3), s(1), s(1), s(3), None, Some(-1)),
        (s(3), s(1), s(5), ms(1), Some(-1), Some(-1)),
        (Duration::ZERO, s(1), ms(1), ms(10), Some(0), Some(-1)),
    ];

    let runs = cases.iter().map(|&(min, max, after, second_after, want, second_want)| async move {
        let id = lock_id();

        assert!(locker.lock_with_time(&id, min, max).await.unwrap(), "{}: first lock", id);
        assert!(!locker.lock_with_time(&id, min, max).await.unwrap(), "{}: second lock", id);

        tokio::time::sleep(after).await;
        let outcome = locker.unlock(&id).await.unwrap();
        match want {
            Some(code) => assert_eq!(outcome.code(), code, "{}: first unlock", id),
            None => assert!(outcome.code() > 0, "{}: first unlock got {}", id, outcome),
        }

        tokio::time::sleep(second_after).await;
        let outcome = locker.unlock(&id).await.unwrap();
        match second_want {
            Some(code) => assert_eq!(outcome.code(), code, "{}: second unlock", id),
            None => assert!(outcome.code() > 0, "{}: second unlock got {}", id, outcome),
        }
    });

    join_all(runs).await;
}

#[tokio::test]
#[ignore = "Requires running Redis instance"]
async fn test_lock_with_time_script() {
    let locker = Locker::redis(service().await);
    run_table(&locker).await;
}

#[tokio::test]
#[ignore = "Requires running Redis instance"]
async fn test_lock_with_time_optimistic() {
    let store = RedisLockStore::new(service().await)
        .with_strategy(ReleaseStrategy::Optimistic { max_attempts: 5 });
    let locker = Locker::new(Arc::new(store));
    run_table(&locker).await;
}

#[tokio::test]
#[ignore = "Requires running Redis instance"]
async fn test_release_shortens_native_expiry() {
    let redis = service().await;
    let locker = Locker::redis(redis.clone());
    let id = lock_id();

    assert!(
        locker
            .lock_with_time(&id, Duration::from_secs(10), Duration::from_secs(30))
            .await
            .unwrap()
    );
    let pttl = redis.pttl(&id).await.unwrap().unwrap();
    assert!(pttl > Duration::from_secs(25));

    let outcome = locker.unlock(&id).await.unwrap();
    let remaining = outcome.remaining();
    // The guard is rounded up to whole seconds.
    assert!(remaining > Duration::ZERO && remaining <= Duration::from_secs(11));

    let pttl = redis.pttl(&id).await.unwrap().unwrap();
    assert!(pttl <= remaining);

    redis.delete(&id).await.unwrap();
}

#[tokio::test]
#[ignore = "Requires running Redis instance"]
async fn test_key_prefix_is_applied() {
    let redis = service().await;
    let config = LockConfig::builder()
        .key_prefix("redlock-test")
        .min_ttl(Duration::ZERO)
        .max_ttl(Duration::from_secs(5))
        .build()
        .unwrap();
    let locker = Locker::redis(redis.clone()).with_config(config);
    let id = Uuid::new_v4().to_string();

    assert!(locker.lock(&id).await.unwrap());
    assert!(redis.exists(&format!("redlock-test:{}", id)).await.unwrap());
    assert!(!redis.exists(&id).await.unwrap());

    assert_eq!(locker.unlock(&id).await.unwrap(), ReleaseOutcome::Released);
    assert!(!redis.exists(&format!("redlock-test:{}", id)).await.unwrap());
}

#[tokio::test]
#[ignore = "Requires running Redis instance"]
async fn test_non_numeric_value_is_a_store_error() {
    let service = service().await;
    let id = lock_id();
    {
        let mut conn = service.get().await.unwrap();
        let _: () = redis::cmd("SET")
            .arg(&id)
            .arg("not-a-timestamp")
            .arg("EX")
            .arg(30)
            .query_async(&mut *conn)
            .await
            .unwrap();
    }

    let locker = Locker::redis(service.clone());
    let err = locker.unlock(&id).await.unwrap_err();
    assert!(err.is_store_error());

    service.delete(&id).await.unwrap();
}

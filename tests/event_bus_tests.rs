mod common;

use auction_sync::clock::Clock;
use auction_sync::error::ClientError;
use auction_sync::event_bus::cache::{list_cache_key, CacheStore, LIST_CACHE_PREFIX};
use auction_sync::event_bus::{EventBus, AUCTION_UPDATED, ORDER_UPDATED};
use common::manual_clock;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(30);

/// 구독 순서대로 호출
#[test]
fn test_publish_in_subscription_order() {
    let bus = EventBus::new();
    let calls = Arc::new(Mutex::new(Vec::new()));

    let mut subscriptions = Vec::new();
    for name in ["목록", "상세", "배지"] {
        let calls = Arc::clone(&calls);
        subscriptions.push(bus.subscribe(AUCTION_UPDATED, move || {
            calls.lock().push(name);
            Ok(())
        }));
    }

    assert_eq!(bus.publish(AUCTION_UPDATED), 3);
    assert_eq!(*calls.lock(), vec!["목록", "상세", "배지"]);
}

/// 한 구독자의 오류나 패닉이 다른 구독자를 막지 않는다
#[test]
fn test_subscriber_failures_are_isolated() {
    let bus = EventBus::new();
    let reached = Arc::new(AtomicUsize::new(0));

    let _failing = bus.subscribe(AUCTION_UPDATED, || Err("조회 실패".into()));
    let _panicking = bus.subscribe(AUCTION_UPDATED, || panic!("구독자 패닉"));
    let counter = Arc::clone(&reached);
    let _healthy = bus.subscribe(AUCTION_UPDATED, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert_eq!(bus.publish(AUCTION_UPDATED), 1);
    assert_eq!(reached.load(Ordering::SeqCst), 1);

    // 버스는 계속 사용할 수 있다
    assert_eq!(bus.publish(AUCTION_UPDATED), 1);
    assert_eq!(reached.load(Ordering::SeqCst), 2);
}

/// 구독 해제 및 drop 시 해제
#[test]
fn test_unsubscribe_and_drop() {
    let bus = EventBus::new();
    let reached = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&reached);
    let first = bus.subscribe(AUCTION_UPDATED, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let counter = Arc::clone(&reached);
    let second = bus.subscribe(AUCTION_UPDATED, move || {
        counter.fetch_add(10, Ordering::SeqCst);
        Ok(())
    });
    assert_eq!(bus.subscriber_count(AUCTION_UPDATED), 2);
    assert_eq!(first.topic(), AUCTION_UPDATED);

    first.unsubscribe();
    assert_eq!(bus.subscriber_count(AUCTION_UPDATED), 1);
    bus.publish(AUCTION_UPDATED);
    assert_eq!(reached.load(Ordering::SeqCst), 10);

    drop(second);
    assert_eq!(bus.subscriber_count(AUCTION_UPDATED), 0);
    assert_eq!(bus.publish(AUCTION_UPDATED), 0);
    assert_eq!(reached.load(Ordering::SeqCst), 10);
}

/// 토픽끼리는 독립
#[test]
fn test_topics_are_independent() {
    let bus = EventBus::new();
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reached);
    let _subscription = bus.subscribe(ORDER_UPDATED, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert_eq!(bus.publish(AUCTION_UPDATED), 0);
    assert_eq!(reached.load(Ordering::SeqCst), 0);
    assert_eq!(bus.clone().publish(ORDER_UPDATED), 1);
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

/// 구독자 안에서 다시 발행/구독해도 교착되지 않는다
#[test]
fn test_reentrant_publish() {
    let bus = EventBus::new();
    let reached = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&reached);
    let _order = bus.subscribe(ORDER_UPDATED, move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    let inner_bus = bus.clone();
    let _auction = bus.subscribe(AUCTION_UPDATED, move || {
        inner_bus.publish(ORDER_UPDATED);
        Ok(())
    });

    assert_eq!(bus.publish(AUCTION_UPDATED), 1);
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

fn counting_fetch(
    calls: &Arc<AtomicUsize>,
    value: Vec<i64>,
) -> impl FnOnce() -> std::future::Ready<auction_sync::error::Result<Vec<i64>>> {
    let calls = Arc::clone(calls);
    move || {
        calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(value))
    }
}

/// 신선한 항목은 조회하지 않는다
#[tokio::test]
async fn test_cache_fresh_hit() {
    let clock = manual_clock();
    let cache = CacheStore::new(EventBus::new(), clock.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    let first: Vec<i64> = cache
        .load("k", TTL, AUCTION_UPDATED, counting_fetch(&calls, vec![1, 2]))
        .await
        .unwrap();
    assert_eq!(first, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    clock.advance(chrono::Duration::seconds(10));
    let second: Vec<i64> = cache
        .load("k", TTL, AUCTION_UPDATED, counting_fetch(&calls, vec![9]))
        .await
        .unwrap();
    assert_eq!(second, vec![1, 2]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// 오래된 항목은 즉시 반환하고 백그라운드 갱신 후 발행
#[tokio::test]
async fn test_cache_stale_while_revalidate() {
    common::init_tracing();
    let clock = manual_clock();
    let bus = EventBus::new();
    let cache = CacheStore::new(bus.clone(), clock.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    let published = Arc::new(tokio::sync::Notify::new());
    let notify = Arc::clone(&published);
    let _subscription = bus.subscribe(AUCTION_UPDATED, move || {
        notify.notify_one();
        Ok(())
    });

    let _: Vec<i64> = cache
        .load("k", TTL, AUCTION_UPDATED, counting_fetch(&calls, vec![1]))
        .await
        .unwrap();
    clock.advance(chrono::Duration::seconds(31));

    let stale: Vec<i64> = cache
        .load("k", TTL, AUCTION_UPDATED, counting_fetch(&calls, vec![2]))
        .await
        .unwrap();
    assert_eq!(stale, vec![1]);

    tokio::time::timeout(Duration::from_secs(5), published.notified())
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.is_refreshing("k"));

    let entry = cache.peek("k").unwrap();
    assert!(entry.is_fresh(clock.now()));
    assert_eq!(entry.payload, serde_json::json!([2]));
}

/// 갱신 실패 시 기존 데이터 유지
#[tokio::test]
async fn test_cache_failed_refresh_keeps_data() {
    let clock = manual_clock();
    let cache = CacheStore::new(EventBus::new(), clock.clone());
    cache.store("k", serde_json::json!([1]), TTL);
    cache.invalidate("k");

    let stale: Vec<i64> = cache
        .load("k", TTL, AUCTION_UPDATED, || async {
            Err::<Vec<i64>, _>(ClientError::SyncFailure("down".to_string()))
        })
        .await
        .unwrap();
    assert_eq!(stale, vec![1]);

    for _ in 0..50 {
        if !cache.is_refreshing("k") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!cache.is_refreshing("k"));
    let entry = cache.peek("k").unwrap();
    assert_eq!(entry.payload, serde_json::json!([1]));
    assert!(!entry.is_fresh(clock.now()));
}

/// 키당 백그라운드 갱신은 하나만
#[tokio::test]
async fn test_cache_single_refresh_per_key() {
    let clock = manual_clock();
    let cache = CacheStore::new(EventBus::new(), clock.clone());
    cache.store("k", serde_json::json!([1]), TTL);
    cache.invalidate("k");

    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(tokio::sync::Notify::new());

    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        let gate = Arc::clone(&gate);
        let _: Vec<i64> = cache
            .load("k", TTL, AUCTION_UPDATED, move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.notified().await;
                Ok(vec![2])
            })
            .await
            .unwrap();
    }

    assert!(cache.is_refreshing("k"));
    tokio::task::yield_now().await;
    gate.notify_waiters();
    for _ in 0..50 {
        if !cache.is_refreshing("k") {
            break;
        }
        gate.notify_waiters();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.peek("k").unwrap().payload, serde_json::json!([2]));
}

/// 항목이 없으면 직접 조회하고 실패는 그대로 돌려준다
#[tokio::test]
async fn test_cache_miss_propagates_error() {
    let clock = manual_clock();
    let cache = CacheStore::new(EventBus::new(), clock);

    let result: auction_sync::error::Result<Vec<i64>> = cache
        .load("k", TTL, AUCTION_UPDATED, || async {
            Err(ClientError::SyncFailure("down".to_string()))
        })
        .await;
    assert!(matches!(result, Err(ClientError::SyncFailure(_))));
    assert!(cache.peek("k").is_none());
}

/// 접두어 무효화
#[test]
fn test_invalidate_prefix() {
    let clock = manual_clock();
    let cache = CacheStore::new(EventBus::new(), clock.clone());
    let all = list_cache_key(None);
    let active = list_cache_key(Some("active"));
    assert_eq!(all, "auctions_list:all");
    assert_eq!(active, "auctions_list:active");

    cache.store(&all, serde_json::json!([]), TTL);
    cache.store(&active, serde_json::json!([]), TTL);
    cache.store("orders", serde_json::json!([]), TTL);

    cache.invalidate_prefix(LIST_CACHE_PREFIX);
    let now = clock.now();
    assert!(!cache.peek(&all).unwrap().is_fresh(now));
    assert!(!cache.peek(&active).unwrap().is_fresh(now));
    assert!(cache.peek("orders").unwrap().is_fresh(now));

    // 없는 키 무효화는 아무 일도 하지 않는다
    cache.invalidate("missing");
    assert!(cache.peek("missing").is_none());
}

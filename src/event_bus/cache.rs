/// 캐시 테이블 (stale-while-revalidate)
/// 1. 신선한 항목은 네트워크 호출 없이 반환
/// 2. 오래된 항목은 즉시 반환하고 백그라운드 갱신, 완료 시 토픽 발행
/// 3. 항목이 없으면 직접 조회
// region:    --- Imports
use super::EventBus;
use crate::clock::Clock;
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

// endregion: --- Imports

/// 경매 목록 캐시 키 접두어
pub const LIST_CACHE_PREFIX: &str = "auctions_list";

/// 경매 목록 캐시 키
pub fn list_cache_key(status: Option<&str>) -> String {
    format!("{}:{}", LIST_CACHE_PREFIX, status.unwrap_or("all"))
}

// region:    --- Cache Entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: serde_json::Value,
    pub last_fetched_at: DateTime<Utc>,
    pub stale_after: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.stale_after
    }
}

// endregion: --- Cache Entry

// region:    --- Cache Store
struct CacheInner {
    entries: Mutex<HashMap<String, CacheEntry>>,
    refreshing: Mutex<HashSet<String>>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
}

/// 프로세스 전역 캐시 테이블 (조회 완료 처리만 기록한다)
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<CacheInner>,
}

impl CacheStore {
    pub fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                refreshing: Mutex::new(HashSet::new()),
                bus,
                clock,
            }),
        }
    }

    /// 캐시 우선 조회
    pub async fn load<T, F, Fut>(&self, key: &str, ttl: Duration, topic: &str, fetch: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let now = self.inner.clock.now();
        let cached = self.peek(key);

        match cached {
            Some(entry) if entry.is_fresh(now) => {
                debug!("{:<12} --> 캐시 적중: key={}", "Cache", key);
                Ok(serde_json::from_value(entry.payload)?)
            }
            Some(entry) => {
                debug!("{:<12} --> 오래된 캐시 반환 후 갱신: key={}", "Cache", key);
                self.spawn_refresh(key, ttl, topic, fetch());
                Ok(serde_json::from_value(entry.payload)?)
            }
            None => {
                info!("{:<12} --> 캐시 없음, 조회: key={}", "Cache", key);
                let value = fetch().await?;
                self.store(key, serde_json::to_value(&value)?, ttl);
                Ok(value)
            }
        }
    }

    /// 백그라운드 갱신 (키당 하나만 진행)
    fn spawn_refresh<T, Fut>(&self, key: &str, ttl: Duration, topic: &str, fut: Fut)
    where
        T: Serialize + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !self.inner.refreshing.lock().insert(key.to_string()) {
            debug!("{:<12} --> 이미 갱신 중: key={}", "Cache", key);
            return;
        }

        let store = self.clone();
        let key = key.to_string();
        let topic = topic.to_string();
        tokio::spawn(async move {
            let result = fut.await.and_then(|value| Ok(serde_json::to_value(&value)?));
            store.inner.refreshing.lock().remove(&key);

            match result {
                Ok(payload) => {
                    store.store(&key, payload, ttl);
                    info!(
                        "{:<12} --> 백그라운드 갱신 완료: key={}, topic={}",
                        "Cache", key, topic
                    );
                    store.inner.bus.publish(&topic);
                }
                Err(e) => warn!(
                    "{:<12} --> 백그라운드 갱신 실패 (기존 데이터 유지): key={}, {}",
                    "Cache", key, e
                ),
            }
        });
    }

    /// 항목 기록
    pub fn store(&self, key: &str, payload: serde_json::Value, ttl: Duration) {
        let now = self.inner.clock.now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            last_fetched_at: now,
            stale_after: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.inner.entries.lock().insert(key.to_string(), entry);
    }

    /// 조회 없이 읽기
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.inner.entries.lock().get(key).cloned()
    }

    /// 항목을 오래된 것으로 표시 (다음 조회에서 갱신)
    pub fn invalidate(&self, key: &str) {
        let now = self.inner.clock.now();
        if let Some(entry) = self.inner.entries.lock().get_mut(key) {
            entry.stale_after = now;
        }
    }

    /// 접두어가 같은 모든 항목 무효화
    pub fn invalidate_prefix(&self, prefix: &str) {
        let now = self.inner.clock.now();
        let mut entries = self.inner.entries.lock();
        for entry in entries.values_mut().filter(|e| e.key.starts_with(prefix)) {
            entry.stale_after = now;
        }
    }

    pub fn is_refreshing(&self, key: &str) -> bool {
        self.inner.refreshing.lock().contains(key)
    }
}

// endregion: --- Cache Store

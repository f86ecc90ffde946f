/// 이벤트 버스
/// 화면끼리 직접 참조하지 않고 서로의 캐시를 무효화하기 위한 발행/구독
/// 토픽은 엔티티 단위가 아닌 리소스 단위이며 페이로드는 없다 (구독자가 직접 다시 조회)
// region:    --- Imports
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

// endregion: --- Imports

pub mod cache;

// region:    --- Topics
pub const AUCTION_UPDATED: &str = "auction_updated";
pub const ORDER_UPDATED: &str = "order_updated";
pub const REQUEST_UPDATED: &str = "request_updated";

// endregion: --- Topics

// region:    --- Event Bus
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

type Handler = Arc<dyn Fn() -> Result<(), HandlerError> + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    topics: Mutex<HashMap<String, Vec<(u64, Handler)>>>,
}

/// 프로세스 전역 이벤트 버스 (복제해도 같은 버스를 가리킨다)
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// 구독 (반환된 구독을 해제하거나 drop 하면 구독 취소)
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
    where
        F: Fn() -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        debug!("{:<12} --> 구독 등록: topic={}, id={}", "EventBus", topic, id);

        Subscription {
            bus: Arc::downgrade(&self.inner),
            topic: topic.to_string(),
            id,
            active: true,
        }
    }

    /// 발행
    /// 현재 구독자를 구독 순서대로 동기 호출한다.
    /// 한 구독자의 오류나 패닉은 기록만 하고 나머지 구독자는 계속 호출한다.
    /// 반환값은 정상 완료된 구독자 수
    pub fn publish(&self, topic: &str) -> usize {
        // 잠금을 풀고 호출해야 구독자가 다시 구독/발행할 수 있다
        let handlers: Vec<Handler> = self
            .inner
            .topics
            .lock()
            .get(topic)
            .map(|entries| entries.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        debug!(
            "{:<12} --> 발행: topic={}, 구독자 수={}",
            "EventBus",
            topic,
            handlers.len()
        );

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler())) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => error!(
                    "{:<12} --> 구독자 처리 오류: topic={}, {:?}",
                    "EventBus", topic, e
                ),
                Err(_) => error!("{:<12} --> 구독자 패닉: topic={}", "EventBus", topic),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .lock()
            .get(topic)
            .map_or(0, |entries| entries.len())
    }
}

// endregion: --- Event Bus

// region:    --- Subscription
/// 구독 핸들
pub struct Subscription {
    bus: Weak<BusInner>,
    topic: String,
    id: u64,
    active: bool,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 구독 취소
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;

        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut topics = bus.topics.lock();
        if let Some(entries) = topics.get_mut(&self.topic) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                topics.remove(&self.topic);
            }
        }
        debug!(
            "{:<12} --> 구독 해제: topic={}, id={}",
            "EventBus", self.topic, self.id
        );
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

// endregion: --- Subscription

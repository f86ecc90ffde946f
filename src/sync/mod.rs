/// 폴링 동기화
/// 푸시 채널 없이 고정 주기 폴링으로 경매 상태를 서버와 최종 일관성 있게 유지한다.
/// 1. 화면이 보이지 않을 때는 조회하지 않음
/// 2. 입찰 수 워터마크로 새 입찰 감지
/// 3. 실패는 기록 후 다음 주기에 재시도 (표시 중인 데이터는 유지)
/// 4. 늦게 도착한 응답이 이긴다 (진행 중인 요청은 취소하지 않음)
// region:    --- Imports
use crate::api::AuctionApi;
use crate::auction::events::AuctionEvent;
use crate::auction::model::{Auction, SyncSnapshot};
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::event_bus::cache::CacheStore;
use crate::event_bus::{EventBus, AUCTION_UPDATED};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// endregion: --- Imports

mod refresh;
mod visibility;

pub use refresh::RefreshIndicator;
pub use visibility::Visibility;

// region:    --- Types
/// 폴링 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollTarget {
    /// 상세 화면: 경매 단건
    Auction(i64),
    /// 목록 화면: 상태 필터 (없으면 전체)
    List { status: Option<String> },
}

/// 동기화 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Fetching,
    Applying,
}

/// 스냅샷 반영 결과
#[derive(Debug, Clone)]
pub struct SnapshotUpdate {
    pub auctions: Arc<Vec<Auction>>,
    /// 입찰 수가 증가한 경매
    pub events: Vec<AuctionEvent>,
    /// 이전 스냅샷과 달라졌는지 여부 (최초 반영은 false)
    pub divergent: bool,
    pub fetched_at: DateTime<Utc>,
    /// 이 응답을 만든 조회의 발송 순번 (도착 순서와 다를 수 있음)
    pub fetch_seq: u64,
}

/// 스냅샷 수신자 (장부 교체, 알림 등)
pub trait SyncListener: Send + Sync {
    fn on_snapshot(&self, update: &SnapshotUpdate);
}

/// 조회 발송 순번
/// 겹친 조회의 응답이 뒤섞여 도착해도 어느 조회가 먼저 나갔는지 구분한다
#[derive(Debug, Clone, Default)]
pub struct FetchSequence(Arc<AtomicU64>);

impl FetchSequence {
    /// 마지막으로 발송된 조회의 순번 (아직 없으면 0)
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Default)]
struct SyncState {
    snapshots: HashMap<i64, SyncSnapshot>,
    watermarks: HashMap<i64, u32>,
    auctions: Arc<Vec<Auction>>,
    phase: Option<SyncPhase>,
    consecutive_failures: u32,
    last_success: Option<DateTime<Utc>>,
    initialized: bool,
}

// endregion: --- Types

// region:    --- Backoff
/// 연속 실패 횟수에 따른 다음 시도까지의 지연
/// 첫 실패 후에는 다음 주기에 바로 재시도한다
pub fn backoff_delay(failures: u32, period: Duration, max_backoff: Duration) -> Duration {
    if failures <= 1 {
        return period;
    }
    let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
    period
        .checked_mul(factor)
        .unwrap_or(max_backoff)
        .min(max_backoff.max(period))
}

/// 지연을 주기 단위 틱 수로 변환 (최소 1틱)
pub fn backoff_ticks(failures: u32, period: Duration, max_backoff: Duration) -> u32 {
    let delay = backoff_delay(failures, period, max_backoff);
    let period_ms = period.as_millis().max(1);
    u32::try_from(delay.as_millis().div_ceil(period_ms))
        .unwrap_or(u32::MAX)
        .max(1)
}

// endregion: --- Backoff

// region:    --- Polling Synchronizer
struct SyncInner {
    target: PollTarget,
    period: Duration,
    max_backoff: Duration,
    api: Arc<dyn AuctionApi>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    listeners: RwLock<Vec<Arc<dyn SyncListener>>>,
    cache: Option<(CacheStore, String, Duration)>,
    state: Mutex<SyncState>,
    fetches: FetchSequence,
    refresh: RefreshIndicator,
    visibility: Visibility,
}

#[derive(Clone)]
pub struct PollingSynchronizer {
    inner: Arc<SyncInner>,
}

/// 실행 중인 폴링 루프 핸들 (화면 해제 시 중지)
pub struct PollHandle {
    cancellation_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl PollHandle {
    /// 타이머 중지. 진행 중인 요청은 취소하지 않으며 응답은 버려진다
    pub async fn stop(mut self) {
        self.cancellation_token.cancel();
        let _ = (&mut self.join_handle).await;
    }

    pub fn is_running(&self) -> bool {
        !self.cancellation_token.is_cancelled() && !self.join_handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}

impl PollingSynchronizer {
    /// 대상에 맞는 주기로 생성 (상세 5초, 목록은 더 길게)
    pub fn new(
        target: PollTarget,
        api: Arc<dyn AuctionApi>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        config: &ClientConfig,
    ) -> Self {
        let period = match target {
            PollTarget::Auction(_) => config.detail_poll_interval,
            PollTarget::List { .. } => config.list_poll_interval,
        };
        Self {
            inner: Arc::new(SyncInner {
                target,
                period,
                max_backoff: config.max_backoff,
                api,
                bus,
                clock,
                listeners: RwLock::new(Vec::new()),
                cache: None,
                state: Mutex::new(SyncState::default()),
                fetches: FetchSequence::default(),
                refresh: RefreshIndicator::new(config.refresh_indicator_min),
                visibility: Visibility::new(),
            }),
        }
    }

    /// 조회 결과를 캐시 테이블에도 기록 (목록 화면용)
    /// 루프 시작 전에 호출해야 한다
    pub fn with_cache(mut self, cache: CacheStore, key: String, ttl: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.cache = Some((cache, key, ttl));
        } else {
            warn!("{:<12} --> 이미 공유된 동기화에는 캐시를 설정할 수 없음", "Sync");
        }
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn SyncListener>) {
        self.inner.listeners.write().push(listener);
    }

    pub fn target(&self) -> &PollTarget {
        &self.inner.target
    }

    pub fn period(&self) -> Duration {
        self.inner.period
    }

    pub fn visibility(&self) -> Visibility {
        self.inner.visibility.clone()
    }

    /// 입찰 장부가 "입찰 이후에 발송된 조회"를 구분할 때 사용
    pub fn fetch_sequence(&self) -> FetchSequence {
        self.inner.fetches.clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.state.lock().phase.unwrap_or(SyncPhase::Idle)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.state.lock().consecutive_failures
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_success
    }

    pub fn snapshot(&self, auction_id: i64) -> Option<SyncSnapshot> {
        self.inner.state.lock().snapshots.get(&auction_id).cloned()
    }

    pub fn auctions(&self) -> Arc<Vec<Auction>> {
        Arc::clone(&self.inner.state.lock().auctions)
    }

    /// 스냅샷 반영 (워터마크 비교, 통째 교체, 수신자 호출, 발행)
    /// 지금 발송한 조회의 응답으로 취급한다
    pub fn apply(&self, auctions: Vec<Auction>) -> SnapshotUpdate {
        let fetch_seq = self.inner.fetches.next();
        self.inner.apply(auctions, fetch_seq)
    }

    /// 한 번 조회 후 반영. 실패는 호출자에게 돌려준다
    pub async fn poll_once(&self) -> Result<SnapshotUpdate> {
        self.inner.poll(None).await
    }

    /// 폴링 루프 시작
    pub fn start(&self) -> PollHandle {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();
        let inner = Arc::clone(&self.inner);

        info!(
            "{:<12} --> 폴링 시작: target={:?}, period={:?}",
            "Sync", inner.target, inner.period
        );
        let join_handle = tokio::spawn(async move {
            run_poll_loop(inner, task_token).await;
        });

        PollHandle {
            cancellation_token,
            join_handle,
        }
    }
}

impl SyncInner {
    async fn fetch(&self) -> Result<Vec<Auction>> {
        match &self.target {
            PollTarget::Auction(id) => Ok(vec![self.api.fetch_auction(*id).await?]),
            PollTarget::List { status } => self.api.fetch_auctions(status.as_deref()).await,
        }
    }

    /// 조회 + 반영. 취소된 뒤 도착한 응답은 버린다
    async fn poll(&self, token: Option<&CancellationToken>) -> Result<SnapshotUpdate> {
        self.set_phase(SyncPhase::Fetching);
        let fetch_seq = self.fetches.next();
        let guard = self.refresh.begin();

        let result = self.fetch().await;
        drop(guard);

        match result {
            Ok(auctions) => {
                if token.is_some_and(CancellationToken::is_cancelled) {
                    debug!("{:<12} --> 해제 후 도착한 응답 폐기", "Sync");
                    self.set_phase(SyncPhase::Idle);
                    return Ok(SnapshotUpdate {
                        auctions: Arc::new(Vec::new()),
                        events: Vec::new(),
                        divergent: false,
                        fetched_at: self.clock.now(),
                        fetch_seq,
                    });
                }
                Ok(self.apply(auctions, fetch_seq))
            }
            Err(e) => {
                let failures = {
                    let mut state = self.state.lock();
                    state.consecutive_failures += 1;
                    state.phase = Some(SyncPhase::Idle);
                    state.consecutive_failures
                };
                warn!(
                    "{:<12} --> 동기화 실패 (기존 데이터 유지, 연속 {}회): {}",
                    "Sync", failures, e
                );
                Err(e)
            }
        }
    }

    fn apply(&self, auctions: Vec<Auction>, fetch_seq: u64) -> SnapshotUpdate {
        self.set_phase(SyncPhase::Applying);
        let now = self.clock.now();
        let auctions = Arc::new(auctions);

        let (events, divergent) = {
            let mut state = self.state.lock();
            let mut events = Vec::new();
            let mut divergent = state.initialized && state.snapshots.len() != auctions.len();

            let mut snapshots = HashMap::with_capacity(auctions.len());
            for auction in auctions.iter() {
                let snapshot = SyncSnapshot::from(auction);

                // 워터마크는 올리기만 한다 (늦게 도착한 이전 응답이 되돌리지 않도록)
                match state.watermarks.get(&auction.id).copied() {
                    Some(previous) if auction.bid_count > previous => {
                        events.push(AuctionEvent::NewBids {
                            auction_id: auction.id,
                            previous_count: previous,
                            bid_count: auction.bid_count,
                            current_bid: auction.current_bid,
                        });
                        state.watermarks.insert(auction.id, auction.bid_count);
                    }
                    Some(_) => {}
                    None => {
                        state.watermarks.insert(auction.id, auction.bid_count);
                    }
                }

                if state.initialized && state.snapshots.get(&auction.id) != Some(&snapshot) {
                    divergent = true;
                }
                snapshots.insert(auction.id, snapshot);
            }

            // 스냅샷은 부분 수정 없이 통째로 교체
            state.snapshots = snapshots;
            state.auctions = Arc::clone(&auctions);
            state.consecutive_failures = 0;
            state.last_success = Some(now);
            state.initialized = true;
            (events, divergent)
        };

        let update = SnapshotUpdate {
            auctions,
            events,
            divergent,
            fetched_at: now,
            fetch_seq,
        };

        if let Some((cache, key, ttl)) = &self.cache {
            match serde_json::to_value(update.auctions.as_ref()) {
                Ok(payload) => cache.store(key, payload, *ttl),
                Err(e) => warn!("{:<12} --> 캐시 기록 실패: {}", "Sync", e),
            }
        }

        let listeners: Vec<Arc<dyn SyncListener>> = self.listeners.read().clone();
        for listener in listeners {
            listener.on_snapshot(&update);
        }

        if !update.events.is_empty() {
            info!(
                "{:<12} --> 새 입찰 감지: {}건, target={:?}",
                "Sync",
                update.events.len(),
                self.target
            );
        }
        if update.divergent || !update.events.is_empty() {
            self.bus.publish(AUCTION_UPDATED);
        }

        self.set_phase(SyncPhase::Idle);
        update
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.state.lock().phase = Some(phase);
    }
}

/// 폴링 루프
async fn run_poll_loop(inner: Arc<SyncInner>, cancel_token: CancellationToken) {
    let mut ticker = interval(inner.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // 첫 틱은 즉시 완료되므로 건너뛴다 (화면 마운트 시 이미 조회함)
    ticker.tick().await;

    let mut visibility_rx = inner.visibility.subscribe();
    let mut ticks_since_attempt = u32::MAX;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                if !inner.visibility.is_visible() {
                    debug!("{:<12} --> 화면 숨김, 조회 생략", "Sync");
                    continue;
                }

                ticks_since_attempt = ticks_since_attempt.saturating_add(1);
                let failures = inner.state.lock().consecutive_failures;
                let wait = backoff_ticks(failures, inner.period, inner.max_backoff);
                if ticks_since_attempt < wait {
                    debug!(
                        "{:<12} --> 백오프 대기 중: {}/{}틱",
                        "Sync", ticks_since_attempt, wait
                    );
                    continue;
                }

                ticks_since_attempt = 0;
                spawn_poll(&inner, &cancel_token);
            }
            changed = visibility_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let visible = *visibility_rx.borrow_and_update();
                if visible {
                    info!("{:<12} --> 화면 다시 표시됨, 즉시 조회", "Sync");
                    ticks_since_attempt = 0;
                    ticker.reset();
                    spawn_poll(&inner, &cancel_token);
                }
            }
        }
    }

    info!("{:<12} --> 폴링 중지: target={:?}", "Sync", inner.target);
}

/// 틱마다 별도 태스크로 조회 (이전 요청과 겹칠 수 있음)
fn spawn_poll(inner: &Arc<SyncInner>, cancel_token: &CancellationToken) {
    let inner = Arc::clone(inner);
    let token = cancel_token.clone();
    tokio::spawn(async move {
        // 실패는 poll 내부에서 기록하고 다음 틱에 재시도한다
        let _ = inner.poll(Some(&token)).await;
    });
}

// endregion: --- Polling Synchronizer

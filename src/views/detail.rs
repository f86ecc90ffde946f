/// 경매 상세 화면
/// 1. 마운트 시 최초 조회 후 폴링 시작
/// 2. 폴링 스냅샷으로 장부 교체 + 새 입찰 알림
/// 3. 입찰은 낙관적으로 적용 후 서버 전송
// region:    --- Imports
use super::ClientContext;
use crate::auction::events::AuctionEvent;
use crate::auction::model::{display_time, Auction, AuctionStatus, Bid};
use crate::auction::status::{format_remaining, time_remaining};
use crate::bidding::commands::BidPlacer;
use crate::bidding::ledger::{BidLedger, Reconciliation};
use crate::error::Result;
use crate::event_bus::cache::{CacheStore, LIST_CACHE_PREFIX};
use crate::sync::{PollHandle, PollTarget, PollingSynchronizer, SnapshotUpdate, SyncListener};
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};

// endregion: --- Imports

/// 화면에 보관하는 최근 이벤트 수
const EVENT_LOG_CAPACITY: usize = 50;

type EventLog = Arc<Mutex<VecDeque<AuctionEvent>>>;

fn record(log: &EventLog, event: AuctionEvent) {
    let mut log = log.lock();
    if log.len() == EVENT_LOG_CAPACITY {
        log.pop_front();
    }
    log.push_back(event);
}

// region:    --- Detail State
/// 상세 화면 표시 모델 (읽을 때마다 현재 시각 기준으로 계산)
#[derive(Debug, Clone)]
pub struct DetailState {
    pub auction: Auction,
    pub status: AuctionStatus,
    pub minimum_next_bid: i64,
    pub time_remaining: Duration,
    pub remaining_label: String,
    pub end_time_display: String,
    pub has_pending_bid: bool,
    pub is_refreshing: bool,
}

// endregion: --- Detail State

// region:    --- Ledger Listener
/// 폴링 스냅샷을 장부에 반영
struct LedgerListener {
    auction_id: i64,
    ledger: Arc<Mutex<Option<BidLedger>>>,
    last_reconciliation: Arc<Mutex<Option<Reconciliation>>>,
    events: EventLog,
    cache: CacheStore,
}

impl SyncListener for LedgerListener {
    fn on_snapshot(&self, update: &SnapshotUpdate) {
        let Some(auction) = update.auctions.iter().find(|a| a.id == self.auction_id) else {
            return;
        };

        let reconciliation = {
            let mut ledger = self.ledger.lock();
            match ledger.as_mut() {
                Some(ledger) => ledger.refresh_fetched(auction, update.fetch_seq),
                None => {
                    *ledger = Some(BidLedger::new(auction.clone()));
                    Reconciliation::Replaced
                }
            }
        };
        *self.last_reconciliation.lock() = Some(reconciliation);

        for event in update.events.iter().filter(|e| e.auction_id() == self.auction_id) {
            record(&self.events, event.clone());
        }
        if let Reconciliation::RolledBack {
            optimistic_bid,
            authoritative_bid,
        } = reconciliation
        {
            record(
                &self.events,
                AuctionEvent::BidRolledBack {
                    auction_id: self.auction_id,
                    optimistic_bid,
                    authoritative_bid,
                },
            );
        }

        // 목록 화면이 다음 조회에서 새 데이터를 받도록
        if update.divergent {
            self.cache.invalidate_prefix(LIST_CACHE_PREFIX);
        }
    }
}

// endregion: --- Ledger Listener

// region:    --- Auction Detail View
pub struct AuctionDetailView {
    auction_id: i64,
    ctx: ClientContext,
    ledger: Arc<Mutex<Option<BidLedger>>>,
    last_reconciliation: Arc<Mutex<Option<Reconciliation>>>,
    events: EventLog,
    sync: PollingSynchronizer,
    placer: BidPlacer,
    handle: Option<PollHandle>,
}

impl AuctionDetailView {
    /// 마운트. 최초 조회가 실패해도 빈 화면으로 시작하고 다음 폴링에서 채운다
    pub async fn mount(ctx: ClientContext, auction_id: i64) -> Self {
        info!("{:<12} --> 상세 화면 마운트: auction={}", "Detail", auction_id);
        let ledger = Arc::new(Mutex::new(None));
        let last_reconciliation = Arc::new(Mutex::new(None));
        let events: EventLog = Arc::new(Mutex::new(VecDeque::new()));

        let sync = ctx.synchronizer(PollTarget::Auction(auction_id));
        sync.add_listener(Arc::new(LedgerListener {
            auction_id,
            ledger: Arc::clone(&ledger),
            last_reconciliation: Arc::clone(&last_reconciliation),
            events: Arc::clone(&events),
            cache: ctx.cache.clone(),
        }));
        sync.add_listener(ctx.notifier.clone());

        if let Err(e) = sync.poll_once().await {
            warn!(
                "{:<12} --> 최초 조회 실패, 다음 폴링에서 재시도: {}",
                "Detail", e
            );
        }
        let handle = sync.start();

        Self {
            auction_id,
            placer: ctx.bid_placer(),
            ctx,
            ledger,
            last_reconciliation,
            events,
            sync,
            handle: Some(handle),
        }
    }

    pub fn auction_id(&self) -> i64 {
        self.auction_id
    }

    pub fn synchronizer(&self) -> &PollingSynchronizer {
        &self.sync
    }

    pub fn is_loaded(&self) -> bool {
        self.ledger.lock().is_some()
    }

    /// 현재 표시 상태
    pub fn state(&self) -> Option<DetailState> {
        let now = self.ctx.clock.now();
        let ledger = self.ledger.lock();
        let ledger = ledger.as_ref()?;
        let auction = ledger.auction().clone();
        let remaining = time_remaining(now, auction.end_time);

        Some(DetailState {
            status: auction.status_at(now, self.ctx.config.ending_soon()),
            minimum_next_bid: auction.minimum_next_bid(),
            remaining_label: format_remaining(remaining),
            time_remaining: remaining,
            end_time_display: display_time(auction.end_time, self.ctx.config.timezone_offset_minutes),
            has_pending_bid: ledger.has_pending(),
            is_refreshing: self.sync.is_refreshing(),
            auction,
        })
    }

    /// 입찰 이력 (서버 순서, 낙관적 입찰은 마지막)
    pub fn bids(&self) -> Vec<Bid> {
        self.ledger
            .lock()
            .as_ref()
            .map(|ledger| ledger.bids().to_vec())
            .unwrap_or_default()
    }

    pub fn last_reconciliation(&self) -> Option<Reconciliation> {
        *self.last_reconciliation.lock()
    }

    /// 최근 이벤트 (오래된 것부터)
    pub fn events(&self) -> Vec<AuctionEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// 입찰
    /// 검증 오류는 네트워크 호출 전에 바로 돌려준다
    pub async fn place_bid(&self, amount: i64) -> Result<Bid> {
        let bid = self
            .placer
            .place(
                &self.ledger,
                self.ctx.identity.as_ref(),
                amount,
                &self.sync.fetch_sequence(),
            )
            .await?;
        record(
            &self.events,
            AuctionEvent::BidPlaced {
                auction_id: bid.auction_id,
                bidder_id: bid.bidder_id,
                bid_amount: bid.amount,
                timestamp: bid.timestamp,
            },
        );
        Ok(bid)
    }

    /// 수동 새로고침
    pub async fn refresh(&self) -> Result<()> {
        self.sync.poll_once().await.map(|_| ())
    }

    pub fn set_visible(&self, visible: bool) {
        self.sync.visibility().set_visible(visible);
    }

    /// 해제 (타이머 중지)
    pub async fn unmount(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop().await;
        }
        info!(
            "{:<12} --> 상세 화면 해제: auction={}",
            "Detail", self.auction_id
        );
    }
}

// endregion: --- Auction Detail View

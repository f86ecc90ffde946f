/// 경매 목록 화면
/// 1. 캐시를 거쳐 목록 조회
/// 2. auction_updated 구독으로 다른 화면의 변경을 반영
/// 3. 상세보다 긴 주기로 폴링하며 결과를 캐시에 기록
// region:    --- Imports
use super::ClientContext;
use crate::auction::model::{Auction, AuctionStatus};
use crate::auction::status::{format_remaining, time_remaining};
use crate::error::Result;
use crate::event_bus::cache::list_cache_key;
use crate::event_bus::{Subscription, AUCTION_UPDATED};
use crate::sync::{PollHandle, PollTarget, PollingSynchronizer, SnapshotUpdate, SyncListener};
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Rows
/// 목록 한 줄 (상태 배지는 읽을 때마다 계산)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionRow {
    pub id: i64,
    pub title: String,
    pub price: i64,
    pub bid_count: u32,
    pub status: AuctionStatus,
    pub is_premium: bool,
    pub remaining: String,
}

/// 목록 행 생성 (프리미엄 우선, 그 외에는 서버 순서 유지)
pub fn build_rows(auctions: &[Auction], now: DateTime<Utc>, ending_soon: Duration) -> Vec<AuctionRow> {
    let mut rows: Vec<AuctionRow> = auctions
        .iter()
        .map(|auction| AuctionRow {
            id: auction.id,
            title: auction.title.clone(),
            price: auction.display_price(),
            bid_count: auction.bid_count,
            status: auction.status_at(now, ending_soon),
            is_premium: auction.is_premium,
            remaining: format_remaining(time_remaining(now, auction.end_time)),
        })
        .collect();
    rows.sort_by_key(|row| !row.is_premium);
    rows
}

// endregion: --- Rows

// region:    --- List Loader
#[derive(Clone)]
struct ListLoader {
    ctx: ClientContext,
    status: Option<String>,
    cache_key: String,
    auctions: Arc<RwLock<Vec<Auction>>>,
    reloads: Arc<AtomicU64>,
}

impl ListLoader {
    /// 캐시 우선 재조회
    async fn reload(&self) -> Result<()> {
        let api = Arc::clone(&self.ctx.api);
        let status = self.status.clone();
        let auctions: Vec<Auction> = self
            .ctx
            .cache
            .load(
                &self.cache_key,
                self.ctx.config.list_cache_ttl,
                AUCTION_UPDATED,
                move || async move { api.fetch_auctions(status.as_deref()).await },
            )
            .await?;

        debug!(
            "{:<12} --> 목록 갱신: key={}, {}건",
            "List",
            self.cache_key,
            auctions.len()
        );
        *self.auctions.write() = auctions;
        self.reloads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// 목록 폴링 결과를 화면 데이터로 반영
struct ListSyncListener {
    auctions: Arc<RwLock<Vec<Auction>>>,
}

impl SyncListener for ListSyncListener {
    fn on_snapshot(&self, update: &SnapshotUpdate) {
        *self.auctions.write() = update.auctions.as_ref().clone();
    }
}

// endregion: --- List Loader

// region:    --- Auction List View
pub struct AuctionListView {
    loader: ListLoader,
    sync: PollingSynchronizer,
    subscription: Option<Subscription>,
    handle: Option<PollHandle>,
}

impl AuctionListView {
    /// 마운트. 최초 조회 실패 시 빈 목록으로 시작한다
    pub async fn mount(ctx: ClientContext, status: Option<String>) -> Self {
        let cache_key = list_cache_key(status.as_deref());
        info!("{:<12} --> 목록 화면 마운트: key={}", "List", cache_key);

        let loader = ListLoader {
            ctx: ctx.clone(),
            status: status.clone(),
            cache_key: cache_key.clone(),
            auctions: Arc::new(RwLock::new(Vec::new())),
            reloads: Arc::new(AtomicU64::new(0)),
        };

        if let Err(e) = loader.reload().await {
            warn!("{:<12} --> 최초 목록 조회 실패: {}", "List", e);
        }

        let handler_loader = loader.clone();
        let subscription = ctx.bus.subscribe(AUCTION_UPDATED, move || {
            let runtime = tokio::runtime::Handle::try_current()?;
            let loader = handler_loader.clone();
            runtime.spawn(async move {
                if let Err(e) = loader.reload().await {
                    warn!("{:<12} --> 목록 재조회 실패: {}", "List", e);
                }
            });
            Ok(())
        });

        let sync = ctx
            .synchronizer(PollTarget::List { status })
            .with_cache(ctx.cache.clone(), cache_key, ctx.config.list_cache_ttl);
        sync.add_listener(Arc::new(ListSyncListener {
            auctions: Arc::clone(&loader.auctions),
        }));
        let handle = sync.start();

        Self {
            loader,
            sync,
            subscription: Some(subscription),
            handle: Some(handle),
        }
    }

    /// 현재 목록 (상태 배지는 지금 시각 기준)
    pub fn rows(&self) -> Vec<AuctionRow> {
        let ctx = &self.loader.ctx;
        build_rows(
            &self.loader.auctions.read(),
            ctx.clock.now(),
            ctx.config.ending_soon(),
        )
    }

    pub fn cache_key(&self) -> &str {
        &self.loader.cache_key
    }

    /// 재조회 횟수 (이벤트 버스 구독 포함)
    pub fn reload_count(&self) -> u64 {
        self.loader.reloads.load(Ordering::Relaxed)
    }

    pub async fn reload(&self) -> Result<()> {
        self.loader.reload().await
    }

    pub fn synchronizer(&self) -> &PollingSynchronizer {
        &self.sync
    }

    pub fn set_visible(&self, visible: bool) {
        self.sync.visibility().set_visible(visible);
    }

    /// 해제 (구독 해제, 타이머 중지)
    pub async fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(handle) = self.handle.take() {
            handle.stop().await;
        }
        info!(
            "{:<12} --> 목록 화면 해제: key={}",
            "List", self.loader.cache_key
        );
    }
}

// endregion: --- Auction List View

/// 입찰 배치 프로토콜
/// 1. 검증 및 낙관적 적용 (네트워크 호출 전)
/// 2. 다른 화면에 변경 알림 (캐시 무효화 + 이벤트 발행)
/// 3. 서버 전송 (확정은 다음 폴링에서)
// region:    --- Imports
use super::ledger::BidLedger;
use crate::api::AuctionApi;
use crate::auction::model::Bid;
use crate::clock::Clock;
use crate::error::{ClientError, Result};
use crate::event_bus::cache::{CacheStore, LIST_CACHE_PREFIX};
use crate::event_bus::{EventBus, AUCTION_UPDATED};
use crate::preferences::Identity;
use crate::sync::FetchSequence;
use chrono::Duration;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

// endregion: --- Imports

// region:    --- Commands
/// 입찰 명령 (서버 전송 본문)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub amount: i64,
}

impl From<&Bid> for PlaceBidCommand {
    fn from(bid: &Bid) -> Self {
        Self {
            auction_id: bid.auction_id,
            user_id: bid.bidder_id,
            user_name: bid.bidder_name.clone(),
            amount: bid.amount,
        }
    }
}

// endregion: --- Commands

// region:    --- Bid Placer
#[derive(Clone)]
pub struct BidPlacer {
    api: Arc<dyn AuctionApi>,
    bus: EventBus,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    ending_soon: Duration,
}

impl BidPlacer {
    pub fn new(
        api: Arc<dyn AuctionApi>,
        bus: EventBus,
        cache: CacheStore,
        clock: Arc<dyn Clock>,
        ending_soon: Duration,
    ) -> Self {
        Self {
            api,
            bus,
            cache,
            clock,
            ending_soon,
        }
    }

    /// 입찰 (검증 -> 알림 -> 전송)
    /// 장부 잠금은 낙관적 적용 동안만 잡는다
    /// 전송이 끝난 뒤 발송된 조회부터 이 입찰을 확정하거나 되돌린다
    pub async fn place(
        &self,
        ledger: &Mutex<Option<BidLedger>>,
        identity: Option<&Identity>,
        amount: i64,
        fetches: &FetchSequence,
    ) -> Result<Bid> {
        let bid = {
            let mut ledger = ledger.lock();
            let ledger = ledger.as_mut().ok_or_else(|| {
                ClientError::SyncFailure("경매 정보를 아직 불러오지 못했습니다.".to_string())
            })?;
            self.apply_optimistic(ledger, identity, amount)?
        };

        self.announce();
        let submitted = self.submit(&bid).await;
        if let Some(ledger) = ledger.lock().as_mut() {
            ledger.settle_pending(bid.id, fetches.current());
        }
        submitted.map(|()| bid)
    }

    /// 1. 검증 및 낙관적 적용
    pub fn apply_optimistic(
        &self,
        ledger: &mut BidLedger,
        identity: Option<&Identity>,
        amount: i64,
    ) -> Result<Bid> {
        let identity = identity.ok_or(ClientError::NotAuthenticated)?;
        ledger.place_bid(
            self.clock.now(),
            identity.user_id,
            &identity.user_name,
            amount,
            self.ending_soon,
        )
    }

    /// 2. 목록 캐시 무효화 후 변경 알림
    /// 장부 잠금을 해제한 뒤 호출해야 한다 (구독자가 화면 상태를 다시 읽음)
    pub fn announce(&self) {
        self.cache.invalidate_prefix(LIST_CACHE_PREFIX);
        self.bus.publish(AUCTION_UPDATED);
    }

    /// 3. 서버 전송
    pub async fn submit(&self, bid: &Bid) -> Result<()> {
        let cmd = PlaceBidCommand::from(bid);
        info!("{:<12} --> 입찰 전송: {:?}", "Bidding", cmd);

        match self.api.submit_bid(&cmd).await {
            Ok(()) => {
                info!(
                    "{:<12} --> 입찰 접수됨, 다음 폴링에서 확정: auction={}",
                    "Bidding", cmd.auction_id
                );
                Ok(())
            }
            Err(e @ ClientError::PlacementRejected { .. }) => {
                warn!(
                    "{:<12} --> 서버가 입찰을 거부함, 다음 폴링에서 되돌림: {}",
                    "Bidding", e
                );
                Err(e)
            }
            Err(e) => {
                warn!("{:<12} --> 입찰 전송 실패: {}", "Bidding", e);
                Err(e)
            }
        }
    }
}

// endregion: --- Bid Placer

#![allow(dead_code)]

use async_trait::async_trait;
use auction_sync::api::AuctionApi;
use auction_sync::auction::model::{mark_winning, Auction, Bid, ServerStatus};
use auction_sync::bidding::commands::PlaceBidCommand;
use auction_sync::clock::ManualClock;
use auction_sync::config::ClientConfig;
use auction_sync::error::{ClientError, Result};
use auction_sync::notification::NotificationSink;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// 트레이싱 초기화 (여러 테스트에서 호출해도 안전)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

/// 테스트 기준 시각
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(base_time()))
}

/// 테스트용 설정 (새로고침 표시 최소 시간 없음)
pub fn test_config() -> ClientConfig {
    ClientConfig {
        refresh_indicator_min: std::time::Duration::ZERO,
        ..ClientConfig::default()
    }
}

/// 시작가 1000, 최소 단위 100, 현재가 1000 인 진행 중 경매
pub fn active_auction(id: i64, now: DateTime<Utc>) -> Auction {
    Auction {
        id,
        title: format!("테스트 경매 {id}"),
        description: "테스트용 경매입니다.".to_string(),
        starting_price: 1000,
        current_bid: Some(1000),
        min_bid_step: 100,
        bid_count: 0,
        start_time: now - Duration::hours(1),
        end_time: now + Duration::hours(2),
        server_status: ServerStatus::Active,
        is_premium: false,
        owner_id: Some(99),
        bids: Vec::new(),
    }
}

pub fn server_bid(auction_id: i64, id: i64, bidder_id: i64, amount: i64, at: DateTime<Utc>) -> Bid {
    Bid {
        id,
        auction_id,
        bidder_id,
        bidder_name: format!("입찰자{bidder_id}"),
        amount,
        timestamp: at,
        is_winning: false,
        provisional: false,
    }
}

// region:    --- Mock Api
/// 메모리 기반 서버
#[derive(Default)]
pub struct MockApi {
    auctions: Mutex<HashMap<i64, Auction>>,
    pub fail: AtomicBool,
    /// false 면 입찰 전송이 성공해도 서버에 반영되지 않음 (조용한 유실)
    pub persist_bids: AtomicBool,
    pub reject: Mutex<Option<(String, String)>>,
    /// 조회 응답 지연 (응답 내용은 호출 시점에 고정)
    pub fetch_delay: Mutex<Option<std::time::Duration>>,
    pub fetch_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub submitted: Mutex<Vec<PlaceBidCommand>>,
}

impl MockApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.persist_bids.store(true, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn insert(&self, auction: Auction) {
        self.auctions.lock().insert(auction.id, auction);
    }

    pub fn get(&self, id: i64) -> Option<Auction> {
        self.auctions.lock().get(&id).cloned()
    }

    /// 다른 사용자의 입찰 반영
    pub fn remote_bid(&self, auction_id: i64, bidder_id: i64, amount: i64) {
        let mut auctions = self.auctions.lock();
        if let Some(auction) = auctions.get_mut(&auction_id) {
            let id = auction.bids.len() as i64 + 1;
            let at = auction.start_time + Duration::minutes(id);
            auction
                .bids
                .push(server_bid(auction_id, id, bidder_id, amount, at));
            mark_winning(&mut auction.bids);
            auction.current_bid = Some(amount);
            auction.bid_count += 1;
        }
    }

    pub fn set_bid_count(&self, auction_id: i64, bid_count: u32) {
        if let Some(auction) = self.auctions.lock().get_mut(&auction_id) {
            auction.bid_count = bid_count;
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuctionApi for MockApi {
    async fn fetch_auction(&self, auction_id: i64) -> Result<Auction> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::SyncFailure("mock 서버 오류".to_string()));
        }
        let auction = self
            .get(auction_id)
            .ok_or_else(|| ClientError::SyncFailure(format!("없는 경매: {auction_id}")));
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        auction
    }

    async fn fetch_auctions(&self, _status: Option<&str>) -> Result<Vec<Auction>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::SyncFailure("mock 서버 오류".to_string()));
        }
        let mut auctions: Vec<Auction> = self
            .auctions
            .lock()
            .values()
            .cloned()
            .map(|mut auction| {
                auction.bids.clear();
                auction
            })
            .collect();
        auctions.sort_by_key(|auction| auction.id);
        Ok(auctions)
    }

    async fn submit_bid(&self, cmd: &PlaceBidCommand) -> Result<()> {
        self.submitted.lock().push(cmd.clone());
        if let Some((code, message)) = self.reject.lock().clone() {
            return Err(ClientError::PlacementRejected {
                code,
                message,
                minimum: None,
            });
        }
        if self.persist_bids.load(Ordering::SeqCst) {
            self.remote_bid(cmd.auction_id, cmd.user_id, cmd.amount);
        }
        Ok(())
    }
}

// endregion: --- Mock Api

// region:    --- Recording Sink
/// 알림 기록용
#[derive(Default)]
pub struct RecordingSink {
    pub sounds: AtomicUsize,
    pub toasts: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn sound_count(&self) -> usize {
        self.sounds.load(Ordering::SeqCst)
    }

    pub fn toast_count(&self) -> usize {
        self.toasts.lock().len()
    }
}

impl NotificationSink for RecordingSink {
    fn play_sound(&self) {
        self.sounds.fetch_add(1, Ordering::SeqCst);
    }

    fn toast(&self, message: &str) {
        self.toasts.lock().push(message.to_string());
    }
}

// endregion: --- Recording Sink

/// 새 입찰 알림
/// 진행 중이거나 종료 임박인 경매에서 입찰 수가 워터마크를 넘을 때만 한 번 알린다.
/// 같은 입찰 수로는 두 번 알리지 않는다 (시각이 아닌 입찰 수 기준)
// region:    --- Imports
use crate::auction::model::AuctionStatus;
use crate::clock::Clock;
use crate::sync::{SnapshotUpdate, SyncListener};
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Notification Sink
/// 알림 출력 (효과음, 토스트)
pub trait NotificationSink: Send + Sync {
    fn play_sound(&self);
    fn toast(&self, message: &str);
}

/// 로그로만 출력하는 기본 구현
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn play_sound(&self) {
        info!("{:<12} --> 효과음 재생", "Notify");
    }

    fn toast(&self, message: &str) {
        info!("{:<12} --> 토스트: {}", "Notify", message);
    }
}

// endregion: --- Notification Sink

// region:    --- Notification Adapter
pub struct NotificationAdapter {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    ending_soon: Duration,
    sound_enabled: AtomicBool,
    watermarks: Mutex<HashMap<i64, u32>>,
    fired: AtomicU64,
}

impl NotificationAdapter {
    pub fn new(
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        ending_soon: Duration,
        sound_enabled: bool,
    ) -> Self {
        Self {
            sink,
            clock,
            ending_soon,
            sound_enabled: AtomicBool::new(sound_enabled),
            watermarks: Mutex::new(HashMap::new()),
            fired: AtomicU64::new(0),
        }
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.sound_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled.load(Ordering::Relaxed)
    }

    /// 지금까지 보낸 알림 수
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// 입찰 수 관찰. 알림을 보냈으면 true
    /// 처음 보는 경매는 워터마크만 기록한다
    pub fn observe(
        &self,
        auction_id: i64,
        status: AuctionStatus,
        bid_count: u32,
        current_bid: Option<i64>,
    ) -> bool {
        let previous = {
            let mut watermarks = self.watermarks.lock();
            let previous = watermarks.get(&auction_id).copied();
            // 종료/예정 상태에서 본 입찰 수도 워터마크로 올려 나중에 다시 알리지 않는다
            if previous.map_or(true, |prev| bid_count > prev) {
                watermarks.insert(auction_id, bid_count);
            }
            previous
        };

        let Some(previous) = previous else {
            return false;
        };
        if bid_count <= previous {
            return false;
        }
        if !status.accepts_bids() {
            debug!(
                "{:<12} --> 알림 생략 (상태: {}): auction={}",
                "Notify", status, auction_id
            );
            return false;
        }

        if self.sound_enabled() {
            self.sink.play_sound();
        }
        let message = match current_bid {
            Some(price) => format!("새 입찰이 등록되었습니다. 현재가 {price}원"),
            None => "새 입찰이 등록되었습니다.".to_string(),
        };
        self.sink.toast(&message);
        self.fired.fetch_add(1, Ordering::Relaxed);

        info!(
            "{:<12} --> 새 입찰 알림: auction={}, {} -> {}",
            "Notify", auction_id, previous, bid_count
        );
        true
    }
}

impl SyncListener for NotificationAdapter {
    fn on_snapshot(&self, update: &SnapshotUpdate) {
        let now = self.clock.now();
        for auction in update.auctions.iter() {
            let status = auction.status_at(now, self.ending_soon);
            self.observe(auction.id, status, auction.bid_count, auction.current_bid);
        }
    }
}

// endregion: --- Notification Adapter

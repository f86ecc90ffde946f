use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 폴링 및 입찰 과정에서 감지되는 경매 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuctionEvent {
    // 새 입찰 감지 (입찰 수 증가)
    NewBids {
        auction_id: i64,
        previous_count: u32,
        bid_count: u32,
        current_bid: Option<i64>,
    },
    // 낙관적 입찰 적용
    BidPlaced {
        auction_id: i64,
        bidder_id: i64,
        bid_amount: i64,
        timestamp: DateTime<Utc>,
    },
    // 서버 스냅샷이 낙관적 상태보다 낮아 되돌림
    BidRolledBack {
        auction_id: i64,
        optimistic_bid: i64,
        authoritative_bid: Option<i64>,
    },
}

impl AuctionEvent {
    pub fn auction_id(&self) -> i64 {
        match self {
            AuctionEvent::NewBids { auction_id, .. }
            | AuctionEvent::BidPlaced { auction_id, .. }
            | AuctionEvent::BidRolledBack { auction_id, .. } => *auction_id,
        }
    }
}

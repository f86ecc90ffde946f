/// 입찰 장부
/// 1. 입찰 검증 및 낙관적 적용
/// 2. 폴링 스냅샷으로 통째 교체 (서버가 항상 우선)
/// 3. 낙관적 입찰은 입찰 이후에 발송된 조회로만 확정/되돌림
// region:    --- Imports
use crate::auction::model::{mark_winning, Auction, Bid, SyncSnapshot};
use crate::error::{ClientError, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Reconciliation
/// 스냅샷 반영 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// 대기 중인 낙관적 입찰 없음
    Replaced,
    /// 서버 상태가 낙관적 입찰 금액 이상으로 따라옴
    Confirmed { amount: i64 },
    /// 서버 상태가 낙관적 상태보다 낮아 되돌림
    RolledBack {
        optimistic_bid: i64,
        authoritative_bid: Option<i64>,
    },
    /// 입찰 전에 발송된 조회의 응답. 낙관적 입찰은 다음 조회까지 유지
    Deferred { optimistic_bid: i64 },
}

/// 서버 확인 전의 낙관적 입찰
#[derive(Debug, Clone)]
struct PendingBid {
    bid: Bid,
    bid_count: u32,
    /// 전송이 끝난 시점의 마지막 조회 순번. 이보다 뒤의 조회만 판정에 쓴다
    /// 전송 중에는 None (어떤 조회 응답도 판정하지 않음)
    settled_after: Option<u64>,
}

impl PendingBid {
    fn judged_by(&self, fetch_seq: Option<u64>) -> bool {
        match (fetch_seq, self.settled_after) {
            (None, _) => true,
            (Some(seq), Some(after)) => seq > after,
            (Some(_), None) => false,
        }
    }
}

// endregion: --- Reconciliation

// region:    --- Bid Ledger
#[derive(Debug, Clone)]
pub struct BidLedger {
    auction: Auction,
    pending: Option<PendingBid>,
    next_provisional_id: i64,
}

impl BidLedger {
    pub fn new(mut auction: Auction) -> Self {
        mark_winning(&mut auction.bids);
        Self {
            auction,
            pending: None,
            next_provisional_id: -1,
        }
    }

    pub fn auction(&self) -> &Auction {
        &self.auction
    }

    pub fn bids(&self) -> &[Bid] {
        &self.auction.bids
    }

    /// 서버 확인을 기다리는 낙관적 입찰 존재 여부
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// 입찰 검증 후 낙관적 적용
    /// 실패 시 어떤 상태도 변경하지 않는다
    pub fn place_bid(
        &mut self,
        now: DateTime<Utc>,
        bidder_id: i64,
        bidder_name: &str,
        amount: i64,
        ending_soon: Duration,
    ) -> Result<Bid> {
        let status = self.auction.status_at(now, ending_soon);
        if !status.accepts_bids() {
            return Err(ClientError::AuctionNotOpen { status });
        }

        let minimum = self.auction.minimum_next_bid();
        if amount < minimum {
            info!(
                "{:<12} --> 최소 입찰가 미달: amount={}, minimum={}",
                "Bidding", amount, minimum
            );
            return Err(ClientError::InsufficientBid { minimum });
        }

        let bid = Bid {
            id: self.next_provisional_id,
            auction_id: self.auction.id,
            bidder_id,
            bidder_name: bidder_name.to_string(),
            amount,
            timestamp: now,
            is_winning: true,
            provisional: true,
        };
        self.next_provisional_id -= 1;

        for existing in &mut self.auction.bids {
            existing.is_winning = false;
        }
        self.auction.bids.push(bid.clone());
        self.auction.current_bid = Some(amount);
        self.auction.bid_count += 1;
        self.pending = Some(PendingBid {
            bid: bid.clone(),
            bid_count: self.auction.bid_count,
            settled_after: None,
        });

        info!(
            "{:<12} --> 낙관적 입찰 적용: auction={}, amount={}, bid_count={}",
            "Bidding", self.auction.id, amount, self.auction.bid_count
        );
        Ok(bid)
    }

    /// 서버 전송이 끝난 입찰 표시
    /// `dispatched` 는 그 시점까지 발송된 마지막 조회 순번. 이후 조회만 입찰을 판정한다
    pub fn settle_pending(&mut self, bid_id: i64, dispatched: u64) {
        if let Some(pending) = self.pending.as_mut() {
            if pending.bid.id == bid_id && pending.settled_after.is_none() {
                pending.settled_after = Some(dispatched);
            }
        }
    }

    /// 스냅샷 반영 (병합 없이 통째로 교체)
    /// 가장 최신 서버 상태로 취급해 대기 중인 입찰을 바로 판정한다
    pub fn reconcile(&mut self, snapshot: &SyncSnapshot) -> Reconciliation {
        self.apply_snapshot(snapshot, None)
    }

    /// 조회 순번이 붙은 스냅샷 반영
    /// 입찰 이전에 발송된 조회는 화면만 교체하고 낙관적 입찰을 다시 얹는다
    pub fn reconcile_fetched(&mut self, snapshot: &SyncSnapshot, fetch_seq: u64) -> Reconciliation {
        self.apply_snapshot(snapshot, Some(fetch_seq))
    }

    /// 전체 경매 정보 반영 (제목, 일정 등 메타데이터 포함)
    pub fn refresh(&mut self, auction: &Auction) -> Reconciliation {
        self.refresh_with(auction, None)
    }

    pub fn refresh_fetched(&mut self, auction: &Auction, fetch_seq: u64) -> Reconciliation {
        self.refresh_with(auction, Some(fetch_seq))
    }

    fn refresh_with(&mut self, auction: &Auction, fetch_seq: Option<u64>) -> Reconciliation {
        if auction.id == self.auction.id {
            self.auction = auction.clone();
        }
        self.apply_snapshot(&SyncSnapshot::from(auction), fetch_seq)
    }

    fn apply_snapshot(&mut self, snapshot: &SyncSnapshot, fetch_seq: Option<u64>) -> Reconciliation {
        if snapshot.auction_id != self.auction.id {
            warn!(
                "{:<12} --> 다른 경매의 스냅샷 무시: ledger={}, snapshot={}",
                "Bidding", self.auction.id, snapshot.auction_id
            );
            return Reconciliation::Replaced;
        }

        self.auction.current_bid = snapshot.current_bid;
        self.auction.bid_count = snapshot.bid_count;
        self.auction.bids = snapshot.bids.clone();
        mark_winning(&mut self.auction.bids);

        let Some(pending) = self.pending.take() else {
            return Reconciliation::Replaced;
        };
        let amount = pending.bid.amount;

        if !pending.judged_by(fetch_seq) {
            debug!(
                "{:<12} --> 입찰 전 조회 응답, 판정 보류: auction={}, fetch_seq={:?}",
                "Bidding", self.auction.id, fetch_seq
            );
            if snapshot.current_bid.map_or(true, |current| current < amount) {
                self.auction.bids.push(pending.bid.clone());
                self.auction.current_bid = Some(amount);
                self.auction.bid_count = snapshot.bid_count.max(pending.bid_count);
                mark_winning(&mut self.auction.bids);
            }
            self.pending = Some(pending);
            return Reconciliation::Deferred {
                optimistic_bid: amount,
            };
        }

        let behind_amount = snapshot
            .current_bid
            .map_or(true, |current| current < amount);
        if behind_amount || snapshot.bid_count < pending.bid_count {
            warn!(
                "{:<12} --> 낙관적 입찰 되돌림: auction={}, optimistic={}, server={:?}",
                "Bidding", self.auction.id, amount, snapshot.current_bid
            );
            Reconciliation::RolledBack {
                optimistic_bid: amount,
                authoritative_bid: snapshot.current_bid,
            }
        } else {
            Reconciliation::Confirmed { amount }
        }
    }
}

// endregion: --- Bid Ledger

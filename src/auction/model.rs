// region:    --- Imports
use super::status;
use crate::error::{ClientError, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// endregion: --- Imports

// region:    --- Status
/// 화면에 표시되는 경매 상태 (시간으로부터 매번 계산)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuctionStatus {
    Pending,
    Upcoming,
    Active,
    EndingSoon,
    Ended,
}

impl AuctionStatus {
    /// 입찰 가능 여부 (진행 중, 종료 임박)
    pub fn accepts_bids(self) -> bool {
        matches!(self, AuctionStatus::Active | AuctionStatus::EndingSoon)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuctionStatus::Pending => "pending",
            AuctionStatus::Upcoming => "upcoming",
            AuctionStatus::Active => "active",
            AuctionStatus::EndingSoon => "ending-soon",
            AuctionStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 서버가 내려준 상태 값 (캐시되어 오래되었을 수 있음)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerStatus {
    /// 판매자가 아직 게시하지 않음
    Pending,
    Upcoming,
    Active,
    Ended,
    Unknown(String),
}

impl From<&str> for ServerStatus {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" | "draft" | "unpublished" => ServerStatus::Pending,
            "upcoming" | "scheduled" => ServerStatus::Upcoming,
            "active" | "ending-soon" | "ending_soon" => ServerStatus::Active,
            "ended" | "completed" | "closed" => ServerStatus::Ended,
            other => ServerStatus::Unknown(other.to_string()),
        }
    }
}

// endregion: --- Status

// region:    --- Domain Model
/// 입찰
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub bidder_name: String,
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
    /// 관찰 시점의 최고 입찰 여부
    pub is_winning: bool,
    /// 로컬에서 낙관적으로 생성된 입찰 (서버 확인 전)
    pub provisional: bool,
}

/// 경매
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub starting_price: i64,
    pub current_bid: Option<i64>,
    pub min_bid_step: i64,
    pub bid_count: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub server_status: ServerStatus,
    pub is_premium: bool,
    pub owner_id: Option<i64>,
    pub bids: Vec<Bid>,
}

impl Auction {
    /// 현재 시각 기준 상태
    pub fn status_at(&self, now: DateTime<Utc>, ending_soon: Duration) -> AuctionStatus {
        status::derive_status(
            now,
            self.start_time,
            self.end_time,
            &self.server_status,
            ending_soon,
        )
    }

    /// 다음 입찰 최소 금액
    pub fn minimum_next_bid(&self) -> i64 {
        match self.current_bid {
            Some(current) => current + self.min_bid_step,
            None => self.starting_price,
        }
    }

    /// 표시 가격 (입찰이 없으면 시작가)
    pub fn display_price(&self) -> i64 {
        self.current_bid.unwrap_or(self.starting_price)
    }
}

/// 동기화 스냅샷 (폴링 한 번의 권위 있는 결과)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub auction_id: i64,
    pub current_bid: Option<i64>,
    pub bid_count: u32,
    pub bids: Vec<Bid>,
}

impl From<&Auction> for SyncSnapshot {
    fn from(auction: &Auction) -> Self {
        Self {
            auction_id: auction.id,
            current_bid: auction.current_bid,
            bid_count: auction.bid_count,
            bids: auction.bids.clone(),
        }
    }
}

/// 최고 입찰 표시 (동일 금액이면 나중 입찰)
pub fn mark_winning(bids: &mut [Bid]) {
    let winner = bids
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| a.amount.cmp(&b.amount).then(ia.cmp(ib)))
        .map(|(index, _)| index);
    for (index, bid) in bids.iter_mut().enumerate() {
        bid.is_winning = Some(index) == winner;
    }
}

// endregion: --- Domain Model

// region:    --- Wire Model
/// GET /auctions?id= 응답 (목록 응답의 각 항목도 같은 형태, bids 생략)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionDto {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub starting_price: Option<i64>,
    #[serde(default)]
    pub current_bid: Option<i64>,
    #[serde(default)]
    pub min_bid_step: Option<i64>,
    #[serde(default)]
    pub bid_count: Option<u32>,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_premium: bool,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub bids: Vec<BidDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidDto {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub user_name: String,
    pub amount: i64,
    pub timestamp: String,
}

/// GET /auctions?status= 응답
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuctionListDto {
    #[serde(default)]
    pub auctions: Vec<AuctionDto>,
}

impl AuctionDto {
    /// 도메인 모델로 변환
    pub fn into_auction(self, default_min_bid_step: i64) -> Result<Auction> {
        let start_time = parse_server_time(&self.start_date)?;
        let end_time = parse_server_time(&self.end_date)?;
        let starting_price = self.starting_price.or(self.current_bid).unwrap_or(0).max(0);

        let mut bids = self
            .bids
            .into_iter()
            .map(|bid| {
                Ok(Bid {
                    id: bid.id,
                    auction_id: self.id,
                    bidder_id: bid.user_id,
                    bidder_name: bid.user_name,
                    amount: bid.amount,
                    timestamp: parse_server_time(&bid.timestamp)?,
                    is_winning: false,
                    provisional: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        mark_winning(&mut bids);

        let bid_count = self.bid_count.unwrap_or(bids.len() as u32);

        Ok(Auction {
            id: self.id,
            title: self.title,
            description: self.description,
            starting_price,
            current_bid: self.current_bid.filter(|bid| *bid >= starting_price),
            min_bid_step: self.min_bid_step.unwrap_or(default_min_bid_step).max(0),
            bid_count,
            start_time,
            end_time,
            server_status: self
                .status
                .as_deref()
                .map_or(ServerStatus::Unknown(String::new()), ServerStatus::from),
            is_premium: self.is_premium,
            owner_id: self.user_id,
            bids,
        })
    }
}

// endregion: --- Wire Model

// region:    --- Time
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// 서버 시간 문자열 파싱
/// 오프셋이 없는 서버 로컬 시간은 보정 없이 그대로 시각으로 사용한다
pub fn parse_server_time(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ClientError::InvalidTimestamp(raw.to_string()))
}

/// 표시용 시간 문자열 (offset_minutes: UTC 기준 동쪽 방향 분)
pub fn display_time(instant: DateTime<Utc>, offset_minutes: i32) -> String {
    let offset =
        FixedOffset::east_opt(offset_minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
    instant
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

// endregion: --- Time

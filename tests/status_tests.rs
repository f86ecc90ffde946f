mod common;

use auction_sync::auction::model::{
    display_time, parse_server_time, AuctionDto, AuctionStatus, ServerStatus,
};
use auction_sync::auction::status::{derive_status, format_remaining, time_remaining};
use auction_sync::config::ClientConfig;
use auction_sync::error::ClientError;
use chrono::{Duration, TimeZone, Utc};
use common::{active_auction, base_time};
use serde_json::json;

fn ending_soon() -> Duration {
    Duration::minutes(5)
}

/// 종료 시각이 지나면 서버가 진행 중이라고 해도 종료
#[test]
fn test_ended_overrides_stale_server_status() {
    let now = base_time();
    let mut auction = active_auction(1, now);
    auction.end_time = now - Duration::seconds(1);
    auction.server_status = ServerStatus::Active;

    assert_eq!(auction.status_at(now, ending_soon()), AuctionStatus::Ended);
    assert!(!auction.status_at(now, ending_soon()).accepts_bids());
}

/// 서버가 종료로 표시하면 시간이 남아 있어도 종료
#[test]
fn test_server_ended_is_absorbing() {
    let now = base_time();
    let status = derive_status(
        now,
        now - Duration::hours(1),
        now + Duration::hours(1),
        &ServerStatus::Ended,
        ending_soon(),
    );
    assert_eq!(status, AuctionStatus::Ended);
}

/// 시작 전: 게시되지 않았으면 대기, 그 외에는 예정
#[test]
fn test_before_start_pending_or_upcoming() {
    let now = base_time();
    let start = now + Duration::hours(1);
    let end = now + Duration::hours(3);

    assert_eq!(
        derive_status(now, start, end, &ServerStatus::Pending, ending_soon()),
        AuctionStatus::Pending
    );
    assert_eq!(
        derive_status(now, start, end, &ServerStatus::Upcoming, ending_soon()),
        AuctionStatus::Upcoming
    );
    // 서버가 진행 중이라고 해도 시작 전이면 예정
    assert_eq!(
        derive_status(now, start, end, &ServerStatus::Active, ending_soon()),
        AuctionStatus::Upcoming
    );
}

/// 종료 임박 경계
#[test]
fn test_ending_soon_threshold() {
    let now = base_time();
    let start = now - Duration::hours(1);

    let at_threshold = derive_status(
        now,
        start,
        now + Duration::minutes(5),
        &ServerStatus::Active,
        ending_soon(),
    );
    assert_eq!(at_threshold, AuctionStatus::EndingSoon);
    assert!(at_threshold.accepts_bids());

    let just_outside = derive_status(
        now,
        start,
        now + Duration::minutes(5) + Duration::seconds(1),
        &ServerStatus::Active,
        ending_soon(),
    );
    assert_eq!(just_outside, AuctionStatus::Active);
}

/// 정확히 종료 시각이면 종료
#[test]
fn test_exact_end_time_is_ended() {
    let now = base_time();
    let status = derive_status(
        now,
        now - Duration::hours(1),
        now,
        &ServerStatus::Active,
        ending_soon(),
    );
    assert_eq!(status, AuctionStatus::Ended);
}

/// 남은 시간 표시
#[test]
fn test_remaining_time_format() {
    let now = base_time();
    assert_eq!(time_remaining(now, now - Duration::minutes(1)), Duration::zero());
    assert_eq!(format_remaining(Duration::zero()), "00:00:00");
    assert_eq!(
        format_remaining(Duration::seconds(2 * 3600 + 3 * 60 + 4)),
        "02:03:04"
    );
    assert_eq!(
        format_remaining(Duration::seconds(86_400 + 2 * 3600 + 3 * 60 + 4)),
        "1d 02:03:04"
    );
}

/// 서버 상태 문자열 해석
#[test]
fn test_server_status_parsing() {
    assert_eq!(ServerStatus::from("ACTIVE"), ServerStatus::Active);
    assert_eq!(ServerStatus::from("draft"), ServerStatus::Pending);
    assert_eq!(ServerStatus::from("scheduled"), ServerStatus::Upcoming);
    assert_eq!(ServerStatus::from("closed"), ServerStatus::Ended);
    assert_eq!(
        ServerStatus::from("paused"),
        ServerStatus::Unknown("paused".to_string())
    );
    assert_eq!(AuctionStatus::EndingSoon.to_string(), "ending-soon");
}

/// 서버 시간 파싱 (오프셋 유무)
#[test]
fn test_parse_server_time() {
    let expected = Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap();
    assert_eq!(parse_server_time("2026-10-19T12:00:00+09:00").unwrap(), expected);
    assert_eq!(parse_server_time("2026-10-19T03:00:00").unwrap(), expected);
    assert_eq!(parse_server_time("2026-10-19 03:00:00").unwrap(), expected);
    assert_eq!(parse_server_time("2026-10-19T03:00").unwrap(), expected);

    let err = parse_server_time("어제").unwrap_err();
    assert!(matches!(err, ClientError::InvalidTimestamp(_)));
}

/// 표시용 시간대 보정
#[test]
fn test_display_time_offset() {
    let instant = Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap();
    assert_eq!(display_time(instant, 0), "2026-10-19 03:00:00");
    assert_eq!(display_time(instant, 540), "2026-10-19 12:00:00");
    assert_eq!(display_time(instant, -60), "2026-10-19 02:00:00");
}

/// 서버 응답 변환: 입찰 수 기본값, 최고 입찰 표시, 시작가 미만 현재가 무시
#[test]
fn test_dto_conversion() {
    let dto: AuctionDto = serde_json::from_value(json!({
        "id": 7,
        "title": "빈티지 카메라",
        "startingPrice": 1000,
        "currentBid": 1200,
        "startDate": "2026-10-19T10:00:00Z",
        "endDate": "2026-10-19T14:00:00Z",
        "status": "active",
        "isPremium": true,
        "userId": 3,
        "bids": [
            { "id": 1, "userId": 10, "userName": "가", "amount": 1100, "timestamp": "2026-10-19T10:30:00Z" },
            { "id": 2, "userId": 11, "userName": "나", "amount": 1200, "timestamp": "2026-10-19T11:00:00Z" }
        ]
    }))
    .unwrap();

    let auction = dto.into_auction(ClientConfig::default().default_min_bid_step).unwrap();
    assert_eq!(auction.bid_count, 2);
    assert_eq!(auction.min_bid_step, 100);
    assert_eq!(auction.minimum_next_bid(), 1300);
    assert_eq!(auction.owner_id, Some(3));
    assert!(auction.is_premium);
    assert!(!auction.bids[0].is_winning);
    assert!(auction.bids[1].is_winning);

    let below: AuctionDto = serde_json::from_value(json!({
        "id": 8,
        "startingPrice": 5000,
        "currentBid": 100,
        "startDate": "2026-10-19T10:00:00Z",
        "endDate": "2026-10-19T14:00:00Z"
    }))
    .unwrap();
    let auction = below.into_auction(100).unwrap();
    assert_eq!(auction.current_bid, None);
    assert_eq!(auction.minimum_next_bid(), 5000);
    assert_eq!(auction.display_price(), 5000);
    assert_eq!(auction.server_status, ServerStatus::Unknown(String::new()));
}

/// 환경 변수 설정
#[test]
fn test_config_from_lookup() {
    let config = ClientConfig::from_lookup(|key| match key {
        "AUCTION_API_URL" => Some("http://example.test/api/".to_string()),
        "DETAIL_POLL_SECS" => Some("3".to_string()),
        "ENDING_SOON_SECS" => Some("600".to_string()),
        "TIMEZONE_OFFSET_MINUTES" => Some("540".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.api_base_url, "http://example.test/api");
    assert_eq!(config.detail_poll_interval, std::time::Duration::from_secs(3));
    assert_eq!(config.list_poll_interval, std::time::Duration::from_secs(15));
    assert_eq!(config.ending_soon(), Duration::minutes(10));
    assert_eq!(config.timezone_offset_minutes, 540);

    let zero = ClientConfig::from_lookup(|key| (key == "DETAIL_POLL_SECS").then(|| "0".to_string()));
    assert!(matches!(zero, Err(ClientError::Config(_))));

    let garbage = ClientConfig::from_lookup(|key| (key == "LIST_POLL_SECS").then(|| "soon".to_string()));
    assert!(matches!(garbage, Err(ClientError::Config(_))));
}

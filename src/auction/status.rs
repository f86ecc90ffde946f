/// 경매 상태 계산
/// 저장된 시작/종료 시각과 현재 시각만으로 상태를 계산한다.
/// 상태는 저장하지 않고 렌더링, 타이머 틱마다 다시 계산한다.
// region:    --- Imports
use super::model::{AuctionStatus, ServerStatus};
use chrono::{DateTime, Duration, Utc};

// endregion: --- Imports

// region:    --- Status Derivation
/// 상태 계산
/// 1. 서버가 종료로 표시했거나 종료 시각이 지났으면 종료 (종료는 흡수 상태)
/// 2. 시작 전이면 예정 (판매자가 게시하지 않았으면 대기)
/// 3. 남은 시간이 임박 기준 이내면 종료 임박
/// 4. 그 외에는 진행 중
pub fn derive_status(
    now: DateTime<Utc>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    server_status: &ServerStatus,
    ending_soon: Duration,
) -> AuctionStatus {
    if *server_status == ServerStatus::Ended || now >= end_time {
        return AuctionStatus::Ended;
    }

    if now < start_time {
        return match server_status {
            ServerStatus::Pending => AuctionStatus::Pending,
            _ => AuctionStatus::Upcoming,
        };
    }

    if end_time - now <= ending_soon {
        AuctionStatus::EndingSoon
    } else {
        AuctionStatus::Active
    }
}

// endregion: --- Status Derivation

// region:    --- Countdown
/// 종료까지 남은 시간 (종료 후에는 0)
pub fn time_remaining(now: DateTime<Utc>, end_time: DateTime<Utc>) -> Duration {
    if now >= end_time {
        Duration::zero()
    } else {
        end_time - now
    }
}

/// 남은 시간 표시 ("1d 02:03:04" 또는 "02:03:04")
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours:02}:{minutes:02}:{seconds:02}")
    } else {
        format!("{hours:02}:{minutes:02}:{seconds:02}")
    }
}

// endregion: --- Countdown

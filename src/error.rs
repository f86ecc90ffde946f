// region:    --- Imports
use crate::auction::model::AuctionStatus;
use thiserror::Error;

// endregion: --- Imports

pub type Result<T> = std::result::Result<T, ClientError>;

/// 클라이언트 오류
#[derive(Debug, Error)]
pub enum ClientError {
    /// 최소 입찰가 미달 (화면에 최소 금액 표시)
    #[error("입찰 금액이 최소 금액({minimum})보다 낮습니다.")]
    InsufficientBid { minimum: i64 },

    /// 로그인하지 않은 사용자의 입찰
    #[error("로그인이 필요합니다.")]
    NotAuthenticated,

    /// 입찰 가능한 상태가 아님
    #[error("입찰할 수 없는 경매 상태입니다: {status}")]
    AuctionNotOpen { status: AuctionStatus },

    /// 폴링 실패 (다음 주기에 재시도)
    #[error("동기화 실패: {0}")]
    SyncFailure(String),

    /// 서버가 입찰을 거부함 (최소 금액을 알려주면 함께 전달)
    #[error("입찰이 거부되었습니다 ({code}): {message}")]
    PlacementRejected {
        code: String,
        message: String,
        minimum: Option<i64>,
    },

    #[error("잘못된 시간 형식: {0}")]
    InvalidTimestamp(String),

    #[error("설정 오류: {0}")]
    Config(String),

    #[error("HTTP 오류: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON 오류: {0}")]
    Json(#[from] serde_json::Error),

    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
}

impl ClientError {
    /// 다음 폴링으로 자연 회복되는 오류 여부
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::SyncFailure(_) | ClientError::Http(_) | ClientError::Json(_)
        )
    }
}

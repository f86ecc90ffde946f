/// 클라이언트 설정
/// 환경 변수에서 읽고, 없으면 기본값을 사용한다
// region:    --- Imports
use crate::error::{ClientError, Result};
use std::str::FromStr;
use std::time::Duration;

// endregion: --- Imports

// region:    --- Defaults
pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_DETAIL_POLL_SECS: u64 = 5;
pub const DEFAULT_LIST_POLL_SECS: u64 = 15;
pub const DEFAULT_REFRESH_INDICATOR_MS: u64 = 500;
/// 종료 임박 기준 (백엔드 계약 확인 전까지는 설정값으로 취급)
pub const DEFAULT_ENDING_SOON_SECS: u64 = 300;
pub const DEFAULT_LIST_CACHE_TTL_SECS: u64 = 30;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 60;
pub const DEFAULT_PREFERENCES_DB_URL: &str = "sqlite::memory:";
pub const DEFAULT_MIN_BID_STEP: i64 = 100;

// endregion: --- Defaults

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub detail_poll_interval: Duration,
    pub list_poll_interval: Duration,
    pub refresh_indicator_min: Duration,
    pub ending_soon_threshold: Duration,
    pub list_cache_ttl: Duration,
    pub max_backoff: Duration,
    /// 표시용 시간대 오프셋 (분). 불변식 계산에는 사용하지 않는다
    pub timezone_offset_minutes: i32,
    pub preferences_db_url: String,
    pub default_min_bid_step: i64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            detail_poll_interval: Duration::from_secs(DEFAULT_DETAIL_POLL_SECS),
            list_poll_interval: Duration::from_secs(DEFAULT_LIST_POLL_SECS),
            refresh_indicator_min: Duration::from_millis(DEFAULT_REFRESH_INDICATOR_MS),
            ending_soon_threshold: Duration::from_secs(DEFAULT_ENDING_SOON_SECS),
            list_cache_ttl: Duration::from_secs(DEFAULT_LIST_CACHE_TTL_SECS),
            max_backoff: Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS),
            timezone_offset_minutes: 0,
            preferences_db_url: DEFAULT_PREFERENCES_DB_URL.to_string(),
            default_min_bid_step: DEFAULT_MIN_BID_STEP,
        }
    }
}

impl ClientConfig {
    /// 환경 변수에서 설정 생성
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키-값 조회 함수로부터 설정 생성
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs = |key: &str, default: Duration| -> Result<Duration> {
            Ok(parse_var::<u64>(&lookup, key)?.map_or(default, Duration::from_secs))
        };

        let config = Self {
            api_base_url: lookup("AUCTION_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base_url),
            detail_poll_interval: secs("DETAIL_POLL_SECS", defaults.detail_poll_interval)?,
            list_poll_interval: secs("LIST_POLL_SECS", defaults.list_poll_interval)?,
            refresh_indicator_min: parse_var::<u64>(&lookup, "REFRESH_INDICATOR_MS")?
                .map_or(defaults.refresh_indicator_min, Duration::from_millis),
            ending_soon_threshold: secs("ENDING_SOON_SECS", defaults.ending_soon_threshold)?,
            list_cache_ttl: secs("LIST_CACHE_TTL_SECS", defaults.list_cache_ttl)?,
            max_backoff: secs("MAX_BACKOFF_SECS", defaults.max_backoff)?,
            timezone_offset_minutes: parse_var(&lookup, "TIMEZONE_OFFSET_MINUTES")?
                .unwrap_or(defaults.timezone_offset_minutes),
            preferences_db_url: lookup("PREFERENCES_DB_URL")
                .unwrap_or(defaults.preferences_db_url),
            default_min_bid_step: parse_var(&lookup, "DEFAULT_MIN_BID_STEP")?
                .unwrap_or(defaults.default_min_bid_step),
        };

        if config.detail_poll_interval.is_zero() || config.list_poll_interval.is_zero() {
            return Err(ClientError::Config(
                "폴링 주기는 0보다 커야 합니다.".to_string(),
            ));
        }
        if config.default_min_bid_step < 0 {
            return Err(ClientError::Config(
                "최소 입찰 단위는 음수일 수 없습니다.".to_string(),
            ));
        }

        Ok(config)
    }

    /// 종료 임박 기준 (chrono)
    pub fn ending_soon(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ending_soon_threshold)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_ENDING_SOON_SECS as i64))
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ClientError::Config(format!("{key} 값이 올바르지 않습니다: {raw}"))),
    }
}

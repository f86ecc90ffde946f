/// 경매 서버 API
/// 클라이언트가 제어하지 않는 외부 백엔드와의 계약
// region:    --- Imports
use crate::auction::model::{Auction, AuctionDto, AuctionListDto};
use crate::bidding::commands::PlaceBidCommand;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Auction Api Trait
#[async_trait]
pub trait AuctionApi: Send + Sync {
    /// 경매 단건 조회 (입찰 이력 포함)
    async fn fetch_auction(&self, auction_id: i64) -> Result<Auction>;

    /// 경매 목록 조회 (입찰 이력 생략)
    async fn fetch_auctions(&self, status: Option<&str>) -> Result<Vec<Auction>>;

    /// 입찰 전송
    async fn submit_bid(&self, cmd: &PlaceBidCommand) -> Result<()>;
}

// endregion: --- Auction Api Trait

// region:    --- Http Auction Api
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// 서버 거부 응답 본문
#[derive(Debug, Deserialize)]
struct RejectionBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    minimum: Option<i64>,
}

pub struct HttpAuctionApi {
    client: Client,
    base_url: String,
    timezone_offset: i32,
    default_min_bid_step: i64,
}

impl HttpAuctionApi {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timezone_offset: config.timezone_offset_minutes,
            default_min_bid_step: config.default_min_bid_step,
        })
    }

    fn auctions_url(&self) -> String {
        format!("{}/auctions", self.base_url)
    }
}

#[async_trait]
impl AuctionApi for HttpAuctionApi {
    async fn fetch_auction(&self, auction_id: i64) -> Result<Auction> {
        debug!("{:<12} --> 경매 조회 id: {}", "Api", auction_id);
        let body: serde_json::Value = self
            .client
            .get(self.auctions_url())
            .query(&[
                ("id", auction_id.to_string()),
                ("timezoneOffset", self.timezone_offset.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // 일부 서버는 단건 조회도 목록 형태로 응답한다
        let dto: AuctionDto = match body.get("auctions") {
            Some(list) => serde_json::from_value::<Vec<AuctionDto>>(list.clone())?
                .into_iter()
                .find(|dto| dto.id == auction_id)
                .ok_or_else(|| {
                    ClientError::SyncFailure(format!("경매를 찾을 수 없습니다: {auction_id}"))
                })?,
            None => serde_json::from_value(body)?,
        };

        dto.into_auction(self.default_min_bid_step)
    }

    async fn fetch_auctions(&self, status: Option<&str>) -> Result<Vec<Auction>> {
        debug!("{:<12} --> 경매 목록 조회 status: {:?}", "Api", status);
        let mut query = vec![("timezoneOffset", self.timezone_offset.to_string())];
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }

        let list: AuctionListDto = self
            .client
            .get(self.auctions_url())
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        list.auctions
            .into_iter()
            .map(|dto| dto.into_auction(self.default_min_bid_step))
            .collect()
    }

    async fn submit_bid(&self, cmd: &PlaceBidCommand) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/bids", self.auctions_url()))
            .json(cmd)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("{:<12} --> 입찰 전송 성공: {}", "Api", status);
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        let rejection = serde_json::from_str::<RejectionBody>(&text).ok();
        let code = rejection
            .as_ref()
            .and_then(|body| body.code.clone())
            .unwrap_or_else(|| status.as_u16().to_string());
        let message = rejection
            .as_ref()
            .and_then(|body| body.error.clone().or_else(|| body.message.clone()))
            .unwrap_or(text);
        let minimum = rejection.and_then(|body| body.minimum);

        Err(ClientError::PlacementRejected {
            code,
            message,
            minimum,
        })
    }
}

// endregion: --- Http Auction Api

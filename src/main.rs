// region:    --- Imports
use auction_sync::api::HttpAuctionApi;
use auction_sync::clock::SystemClock;
use auction_sync::config::ClientConfig;
use auction_sync::event_bus::AUCTION_UPDATED;
use auction_sync::notification::LogNotificationSink;
use auction_sync::preferences::{LocalPreferences, PreferenceStore};
use auction_sync::views::{AuctionDetailView, AuctionListView, ClientContext};
use std::sync::Arc;
use tracing::{error, info, warn};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 설정 로드
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{:<12} --> 설정 로드 실패: {}", "Main", e);
            return Err(e.into());
        }
    };
    info!("{:<12} --> 서버: {}", "Main", config.api_base_url);

    // 로컬 설정 (없어도 초기화를 막지 않음)
    let preferences = match PreferenceStore::open(&config.preferences_db_url).await {
        Ok(store) => store.load().await,
        Err(e) => {
            warn!("{:<12} --> 설정 저장소를 열 수 없어 기본값 사용: {}", "Main", e);
            LocalPreferences::default()
        }
    };

    let api = Arc::new(HttpAuctionApi::new(&config)?);
    let ctx = ClientContext::new(
        config,
        api,
        Arc::new(SystemClock),
        Arc::new(LogNotificationSink),
        &preferences,
    );

    let _updates = ctx.bus.subscribe(AUCTION_UPDATED, || {
        info!("{:<12} --> 경매 정보 변경됨", "Main");
        Ok(())
    });

    // AUCTION_ID 가 있으면 상세 화면, 없으면 목록 화면
    let auction_id = std::env::var("AUCTION_ID")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok());

    match auction_id {
        Some(auction_id) => {
            let view = AuctionDetailView::mount(ctx, auction_id).await;
            if let Some(state) = view.state() {
                info!(
                    "{:<12} --> {} | {} | 현재가 {} | 다음 최소 {} | 남은 시간 {}",
                    "Main",
                    state.auction.title,
                    state.status,
                    state.auction.display_price(),
                    state.minimum_next_bid,
                    state.remaining_label
                );
            }
            tokio::signal::ctrl_c().await?;
            view.unmount().await;
        }
        None => {
            let status = std::env::var("AUCTION_STATUS").ok();
            let view = AuctionListView::mount(ctx, status).await;
            for row in view.rows() {
                info!(
                    "{:<12} --> #{} {} [{}] {}원 ({}건)",
                    "Main", row.id, row.title, row.status, row.price, row.bid_count
                );
            }
            tokio::signal::ctrl_c().await?;
            view.unmount().await;
        }
    }

    info!("{:<12} --> 종료", "Main");
    Ok(())
}
// endregion: --- Main

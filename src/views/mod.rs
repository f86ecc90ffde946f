/// 화면 구성
/// 상세/목록 화면이 공유하는 의존성 묶음
// region:    --- Imports
use crate::api::AuctionApi;
use crate::bidding::commands::BidPlacer;
use crate::clock::Clock;
use crate::config::ClientConfig;
use crate::event_bus::cache::CacheStore;
use crate::event_bus::EventBus;
use crate::notification::{NotificationAdapter, NotificationSink};
use crate::preferences::{Identity, LocalPreferences};
use crate::sync::{PollTarget, PollingSynchronizer};
use std::sync::Arc;

// endregion: --- Imports

pub mod detail;
pub mod list;

pub use detail::{AuctionDetailView, DetailState};
pub use list::{AuctionListView, AuctionRow};

// region:    --- Client Context
/// 프로세스 단위 공유 의존성 (버스, 캐시, 알림은 모든 화면이 공유)
#[derive(Clone)]
pub struct ClientContext {
    pub config: ClientConfig,
    pub api: Arc<dyn AuctionApi>,
    pub bus: EventBus,
    pub cache: CacheStore,
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<NotificationAdapter>,
    pub identity: Option<Identity>,
}

impl ClientContext {
    pub fn new(
        config: ClientConfig,
        api: Arc<dyn AuctionApi>,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn NotificationSink>,
        preferences: &LocalPreferences,
    ) -> Self {
        let bus = EventBus::new();
        let cache = CacheStore::new(bus.clone(), Arc::clone(&clock));
        let notifier = Arc::new(NotificationAdapter::new(
            sink,
            Arc::clone(&clock),
            config.ending_soon(),
            preferences.sound_enabled,
        ));
        Self {
            identity: preferences.identity(),
            config,
            api,
            bus,
            cache,
            clock,
            notifier,
        }
    }

    pub fn with_identity(mut self, identity: Option<Identity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn bid_placer(&self) -> BidPlacer {
        BidPlacer::new(
            Arc::clone(&self.api),
            self.bus.clone(),
            self.cache.clone(),
            Arc::clone(&self.clock),
            self.config.ending_soon(),
        )
    }

    pub fn synchronizer(&self, target: PollTarget) -> PollingSynchronizer {
        PollingSynchronizer::new(
            target,
            Arc::clone(&self.api),
            self.bus.clone(),
            Arc::clone(&self.clock),
            &self.config,
        )
    }
}

// endregion: --- Client Context

use std::sync::Arc;

use tokio::sync::broadcast;
use turnstile_core::{BookingRules, BookingStore, Clock};
use turnstile_hold::HoldManager;
use turnstile_order::{QueryFacade, SettlementEngine};
use turnstile_shared::InventoryChange;
use turnstile_store::app_config::RateLimitConfig;
use turnstile_store::RedisClient;

use crate::metrics::Metrics;

const CHANGE_BUFFER: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub holds: Arc<HoldManager>,
    pub settlement: Arc<SettlementEngine>,
    pub queries: Arc<QueryFacade>,
    pub sse_tx: broadcast::Sender<InventoryChange>,
    pub metrics: Arc<Metrics>,
    /// Rate limiting is off when Redis is not configured.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        rules: BookingRules,
    ) -> Result<Self, prometheus::Error> {
        let (sse_tx, _) = broadcast::channel(CHANGE_BUFFER);

        let holds = Arc::new(
            HoldManager::new(store.clone(), clock.clone(), rules).with_changes(sse_tx.clone()),
        );
        let settlement = Arc::new(
            SettlementEngine::new(store.clone(), holds.clone(), clock).with_changes(sse_tx.clone()),
        );
        let queries = Arc::new(QueryFacade::new(store));

        Ok(Self {
            holds,
            settlement,
            queries,
            sse_tx,
            metrics: Arc::new(Metrics::new()?),
            redis: None,
            rate_limit: RateLimitConfig::default(),
        })
    }

    pub fn with_rate_limit(mut self, redis: RedisClient, config: RateLimitConfig) -> Self {
        self.redis = Some(Arc::new(redis));
        self.rate_limit = config;
        self
    }
}

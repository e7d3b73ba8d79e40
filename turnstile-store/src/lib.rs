pub mod app_config;
pub mod database;
pub mod memory;
pub mod postgres_repo;
pub mod redis_repo;
pub mod seed;

use async_trait::async_trait;
use turnstile_core::StoreResult;
use turnstile_shared::{Event, Seat};

pub use database::DbClient;
pub use memory::MemoryStore;
pub use postgres_repo::PostgresStore;
pub use redis_repo::RedisClient;

/// Loads catalog data. Existing rows are left untouched, so loading twice is safe.
#[async_trait]
pub trait CatalogLoader: Send + Sync {
    /// Inserts events and seats, and an AVAILABLE inventory row for every
    /// (event, seat) pair that has none yet.
    async fn load_catalog(&self, events: &[Event], seats: &[Seat]) -> StoreResult<()>;
}

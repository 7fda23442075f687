pub mod catalog;
pub mod interactions;
pub mod model_store;
pub mod postgres;
pub mod preferences;
pub mod rankings;
pub mod redis;

pub use catalog::{CatalogRepository, InMemoryCatalogRepository, PgCatalogRepository};
pub use interactions::{
    InMemoryInteractionRepository, InteractionRepository, PgInteractionRepository,
};
pub use model_store::{FileModelStore, MemoryModelStore, ModelStore};
pub use postgres::{create_pool, run_migrations};
pub use preferences::{InMemoryPreferenceRepository, PgPreferenceRepository, PreferenceRepository};
pub use rankings::{InMemoryRankingRepository, PgRankingRepository, RankingRepository};
pub use self::redis::{create_redis_client, CacheKey, RedisModelStore};

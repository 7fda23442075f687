use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;

use crate::db::ModelStore;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The fitted catalog vector space (one per deployment)
    RecommenderModel,
    /// Namespaced model key, for deployments sharing one Redis
    NamespacedModel(String),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::RecommenderModel => write!(f, "recommender:model"),
            CacheKey::NamespacedModel(ns) => write!(f, "{}:recommender:model", ns.to_lowercase()),
        }
    }
}

/// Opens a Redis client for the shared model cache
///
/// Lets several processes reuse one fitted artifact instead of each keeping
/// a file on local disk.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Model artifact stored under a single Redis key
///
/// Entries carry no TTL: the artifact lives until the catalog changes and the
/// cache is invalidated. Commands go through one managed connection that
/// reconnects on its own.
#[derive(Clone)]
pub struct RedisModelStore {
    connection: ConnectionManager,
    key: CacheKey,
}

impl RedisModelStore {
    /// Opens the managed connection and targets `key`
    pub async fn connect(redis_client: Client, key: CacheKey) -> AppResult<Self> {
        let connection = ConnectionManager::new(redis_client).await?;
        tracing::info!(key = %key, "Redis model store connected");
        Ok(Self { connection, key })
    }
}

#[async_trait::async_trait]
impl ModelStore for RedisModelStore {
    async fn read(&self) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let cached: Option<Vec<u8>> = conn.get(self.key.to_string()).await.map_err(|e| {
            tracing::warn!(error = %e, "Redis get failed");
            e
        })?;
        Ok(cached)
    }

    async fn write(&self, bytes: &[u8]) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(self.key.to_string(), bytes).await.map_err(|e| {
            tracing::warn!(error = %e, "Redis set failed");
            e
        })?;
        tracing::debug!(key = %self.key, bytes = bytes.len(), "Model artifact written");
        Ok(())
    }

    async fn delete(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(self.key.to_string()).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_model() {
        assert_eq!(format!("{}", CacheKey::RecommenderModel), "recommender:model");
    }

    #[test]
    fn test_cache_key_display_namespaced_lowercase() {
        let key = CacheKey::NamespacedModel("Staging".to_string());
        assert_eq!(format!("{}", key), "staging:recommender:model");
    }

    #[test]
    fn test_create_client_rejects_bad_url() {
        assert!(create_redis_client("not a url").is_err());
    }
}

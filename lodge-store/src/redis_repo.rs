use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;
use lodge_core::{SessionStorage, StoreError, StoreResult};

/// Session storage on Redis. Keys carry the TTL the session manager asks for,
/// so abandoned sessions disappear without a sweep.
#[derive(Clone)]
pub struct RedisSessionStorage {
    client: redis::Client,
}

impl RedisSessionStorage {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(StoreError::connection)
    }
}

#[async_trait]
impl SessionStorage for RedisSessionStorage {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key).await.map_err(StoreError::database)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        match ttl_seconds {
            Some(ttl) if ttl > 0 => conn.set_ex::<_, _, ()>(key, value, ttl).await,
            _ => conn.set::<_, _, ()>(key, value).await,
        }
        .map_err(StoreError::database)?;
        debug!(key, ?ttl_seconds, "session entry written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(StoreError::database)
    }
}

//! Best-effort Redis TTL cache.
//!
//! Every operation here is fail-open: a Redis outage is logged and treated
//! as a cache miss, it never fails the request. Correctness-relevant state
//! (denials, cached match lists) lives in Postgres, not here.

use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};

/// TTL for cached user profiles, in seconds.
pub const PROFILE_TTL_SECS: u64 = 3600;

pub fn profile_key(uid: &str) -> String {
    format!("user:{}", uid)
}

#[derive(Clone)]
pub struct Cache {
    client: Option<Client>,
}

impl Cache {
    /// Builds a cache handle from a Redis URL. A malformed URL degrades to
    /// a no-op cache rather than refusing to start.
    pub fn connect(url: &str) -> Self {
        match Client::open(url) {
            Ok(client) => Self {
                client: Some(client),
            },
            Err(e) => {
                tracing::warn!("Redis unavailable, running without cache: {}", e);
                Self { client: None }
            }
        }
    }

    /// A cache that never hits, for tests and cache-less deployments.
    pub fn disabled() -> Self {
        Self { client: None }
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        let client = self.client.as_ref()?;
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                tracing::warn!("Redis connection failed: {}", e);
                None
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = match conn.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache get failed for {}: {}", key, e);
                return None;
            }
        };
        raw.and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Cache serialization failed for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl_seconds).await {
            tracing::warn!("Cache set failed for {}: {}", key, e);
        }
    }

    pub async fn delete(&self, key: &str) {
        let Some(mut conn) = self.connection().await else {
            return;
        };
        if let Err(e) = conn.del::<_, u64>(key).await {
            tracing::warn!("Cache delete failed for {}: {}", key, e);
        }
    }
}

//! Кеш поверх Redis. Without a Redis connection every lookup goes straight
//! to Postgres and invalidation is a no-op.

use crate::{database::Database, redis_client::RedisClient};
use tracing::{info, warn};

pub mod auth;
pub mod events;

#[derive(Clone)]
pub struct CacheService {
    redis: Option<RedisClient>,
    db: Database,
    events_ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: Option<RedisClient>, db: Database, events_ttl_seconds: u64) -> Self {
        Self {
            redis,
            db,
            events_ttl_seconds,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    // Прогрев кеша при старте
    pub async fn warmup_cache(&self) {
        if !self.is_enabled() {
            return;
        }
        info!("Starting cache warmup...");
        match self.get_catalogue().await {
            Ok(events) => info!("Cache warmup done, {} events", events.len()),
            Err(e) => warn!("Cache warmup failed: {}", e),
        }
    }
}

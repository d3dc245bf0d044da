use crate::cache::CacheService;
use crate::error::AppError;
use crate::models::event::EVENT_COLUMNS;
use crate::models::EventSummary;
use redis::AsyncCommands;
use tracing::{info, warn};

pub const CATALOGUE_KEY: &str = "events:catalogue";

impl CacheService {
    /// Весь каталог с агрегатами рейтингов. Redis first, Postgres on a miss
    /// or when Redis is down.
    pub async fn get_catalogue(&self) -> Result<Vec<EventSummary>, AppError> {
        match self.get_catalogue_from_cache().await {
            Ok(Some(events)) => return Ok(events),
            Ok(None) => {}
            Err(e) => warn!("catalogue cache read failed: {}", e),
        }

        let events = self.load_catalogue_from_db().await?;
        if let Err(e) = self.save_catalogue_to_cache(&events).await {
            warn!("catalogue cache write failed: {}", e);
        }
        Ok(events)
    }

    /// Called after anything that changes an event, its stock or its ratings.
    pub async fn invalidate_catalogue(&self) {
        let Some(redis) = &self.redis else {
            return;
        };
        let mut conn = redis.conn.clone();
        let result: Result<(), _> = conn.del(CATALOGUE_KEY).await;
        match result {
            Ok(()) => info!("Invalidated events catalogue cache"),
            Err(e) => warn!("catalogue cache invalidation failed: {}", e),
        }
    }

    async fn load_catalogue_from_db(&self) -> Result<Vec<EventSummary>, sqlx::Error> {
        sqlx::query_as::<_, EventSummary>(&format!(
            "SELECT {},
                    COALESCE(AVG(r.rating), 0)::FLOAT8 AS average_rating,
                    COUNT(r.id) AS total_ratings
             FROM events e
             LEFT JOIN event_ratings r ON r.event_id = e.id
             GROUP BY e.id
             ORDER BY e.date",
            EVENT_COLUMNS
        ))
        .fetch_all(&self.db.pool)
        .await
    }

    // === Работа с кешем ===

    async fn get_catalogue_from_cache(&self) -> Result<Option<Vec<EventSummary>>, redis::RedisError> {
        let Some(redis) = &self.redis else {
            return Ok(None);
        };
        let mut conn = redis.conn.clone();
        let data: Option<String> = conn.get(CATALOGUE_KEY).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        let events: Vec<EventSummary> = serde_json::from_str(&data).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Parse error"))
        })?;
        Ok(Some(events))
    }

    async fn save_catalogue_to_cache(&self, events: &[EventSummary]) -> Result<(), redis::RedisError> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };
        let data = serde_json::to_string(events).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = redis.conn.clone();
        conn.set_ex(CATALOGUE_KEY, data, self.events_ttl_seconds).await
    }
}

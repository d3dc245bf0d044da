use super::SessionStore;
use crate::error::AppError;
use crate::redis_client::RedisClient;
use redis::AsyncCommands;

/// Сессии в Redis: `session:{id}:{key}` с TTL, который обновляется при записи.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: RedisClient,
    idle_seconds: u64,
}

fn store_error(e: redis::RedisError) -> AppError {
    AppError::Session(e.to_string())
}

impl RedisSessionStore {
    pub fn new(redis: RedisClient, idle_seconds: u64) -> Self {
        Self { redis, idle_seconds }
    }
}

impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.redis.conn.clone();
        let value: Option<String> = conn
            .get(RedisClient::session_key(session_id, key))
            .await
            .map_err(store_error)?;
        Ok(value)
    }

    async fn set(&self, session_id: &str, key: &str, value: String) -> Result<(), AppError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn
            .set_ex(RedisClient::session_key(session_id, key), value, self.idle_seconds)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), AppError> {
        let mut conn = self.redis.conn.clone();
        let _: () = conn
            .del(RedisClient::session_key(session_id, key))
            .await
            .map_err(store_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_failures_surface_as_session_errors() {
        let err = store_error(redis::RedisError::from((redis::ErrorKind::IoError, "connection refused")));
        assert!(matches!(err, AppError::Session(_)));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}

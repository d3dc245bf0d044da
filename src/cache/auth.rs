use crate::cache::CacheService;
use crate::middleware::AuthUser;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use tracing::info;

/// Проверенные учетные данные живут в кеше минуту: bcrypt на каждый запрос
/// слишком дорог.
const AUTH_TTL_SECONDS: u64 = 60;

fn auth_key(email: &str, password: &str) -> String {
    let email = email.to_lowercase();
    let digest = Sha256::digest(format!("{}:{}", email, password).as_bytes());
    format!("auth:{}:{:x}", email, digest)
}

impl CacheService {
    /// Сохранить данные авторизованного пользователя в кеш
    pub async fn cache_auth_user(&self, password: &str, user: &AuthUser) -> Result<(), redis::RedisError> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };
        let data = serde_json::to_string(user).map_err(|_| {
            redis::RedisError::from((redis::ErrorKind::TypeError, "Serialize error"))
        })?;
        let mut conn = redis.conn.clone();
        conn.set_ex(auth_key(&user.email, password), data, AUTH_TTL_SECONDS).await
    }

    pub async fn get_cached_auth_user(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<AuthUser>, redis::RedisError> {
        let Some(redis) = &self.redis else {
            return Ok(None);
        };
        let mut conn = redis.conn.clone();
        let data: Option<String> = conn.get(auth_key(email, password)).await?;
        Ok(data.and_then(|d| serde_json::from_str(&d).ok()))
    }

    /// Drops every cached credential of the user; used after role changes
    /// and account deletion.
    pub async fn invalidate_user_auth(&self, email: &str) -> Result<(), redis::RedisError> {
        let Some(redis) = &self.redis else {
            return Ok(());
        };
        let pattern = format!("auth:{}:*", email.to_lowercase());
        let mut conn = redis.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(&pattern)
            .query_async(&mut conn)
            .await?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
            info!("Invalidated cached credentials for {}", email);
        }
        Ok(())
    }
}

use super::SessionStore;
use crate::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Сессии в памяти процесса. Срок жизни продлевается при каждой записи.
#[derive(Clone)]
pub struct MemorySessionStore {
    entries: Arc<RwLock<HashMap<(String, String), Entry>>>,
    idle: Duration,
}

impl MemorySessionStore {
    pub fn new(idle: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            idle,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(session_id.to_string(), key.to_string()))
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone()))
    }

    async fn set(&self, session_id: &str, key: &str, value: String) -> Result<(), AppError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        // Просроченные записи вычищаются под той же блокировкой
        entries.retain(|_, e| e.expires_at > now);
        entries.insert(
            (session_id.to_string(), key.to_string()),
            Entry {
                value,
                expires_at: now + self.idle,
            },
        );
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), AppError> {
        self.entries
            .write()
            .await
            .remove(&(session_id.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn values_are_scoped_per_session() {
        let store = MemorySessionStore::new(Duration::from_secs(60));
        store.set("s1", "cart", "a".to_string()).await.unwrap();
        store.set("s2", "cart", "b".to_string()).await.unwrap();

        assert_eq!(store.get("s1", "cart").await.unwrap().as_deref(), Some("a"));
        assert_eq!(store.get("s2", "cart").await.unwrap().as_deref(), Some("b"));

        store.remove("s1", "cart").await.unwrap();
        assert_eq!(store.get("s1", "cart").await.unwrap(), None);
        assert_eq!(store.get("s2", "cart").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_idle_timeout() {
        let store = MemorySessionStore::new(Duration::from_secs(30));
        store.set("s1", "cart", "a".to_string()).await.unwrap();

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.get("s1", "cart").await.unwrap(), None);

        store.set("s2", "cart", "b".to_string()).await.unwrap();
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rewriting_a_key_extends_its_lifetime() {
        let store = MemorySessionStore::new(Duration::from_secs(30));
        store.set("s1", "cart", "a".to_string()).await.unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        store.set("s1", "cart", "b".to_string()).await.unwrap();
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(store.get("s1", "cart").await.unwrap().as_deref(), Some("b"));
        assert_eq!(store.len().await, 1);
    }
}

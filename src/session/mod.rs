//! Хранилище сессий: строковые значения по ключу в пределах одной сессии.
//!
//! The cart and the guest login live here. Two backends exist: Redis for
//! deployments and process memory when no `REDIS_URL` is configured.

pub mod memory;
pub mod redis_store;

use crate::error::AppError;
use std::future::Future;

pub use self::memory::MemorySessionStore;
pub use self::redis_store::RedisSessionStore;

/// Ключи значений внутри сессии.
pub mod keys {
    pub const CART: &str = "cart";
    pub const GUEST_EMAIL: &str = "guest_email";
    pub const GUEST_NAME: &str = "guest_name";
}

pub trait SessionStore: Send + Sync {
    fn get(
        &self,
        session_id: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    fn set(
        &self,
        session_id: &str,
        key: &str,
        value: String,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn remove(&self, session_id: &str, key: &str) -> impl Future<Output = Result<(), AppError>> + Send;
}

#[derive(Clone)]
pub enum SessionBackend {
    Redis(RedisSessionStore),
    Memory(MemorySessionStore),
}

impl SessionStore for SessionBackend {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, AppError> {
        match self {
            SessionBackend::Redis(store) => store.get(session_id, key).await,
            SessionBackend::Memory(store) => store.get(session_id, key).await,
        }
    }

    async fn set(&self, session_id: &str, key: &str, value: String) -> Result<(), AppError> {
        match self {
            SessionBackend::Redis(store) => store.set(session_id, key, value).await,
            SessionBackend::Memory(store) => store.set(session_id, key, value).await,
        }
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), AppError> {
        match self {
            SessionBackend::Redis(store) => store.remove(session_id, key).await,
            SessionBackend::Memory(store) => store.remove(session_id, key).await,
        }
    }
}

/// Store that is always down, for exercising outage paths.
#[cfg(test)]
pub(crate) struct UnavailableStore;

#[cfg(test)]
impl SessionStore for UnavailableStore {
    async fn get(&self, _session_id: &str, _key: &str) -> Result<Option<String>, AppError> {
        Err(AppError::Session("store offline".to_string()))
    }

    async fn set(&self, _session_id: &str, _key: &str, _value: String) -> Result<(), AppError> {
        Err(AppError::Session("store offline".to_string()))
    }

    async fn remove(&self, _session_id: &str, _key: &str) -> Result<(), AppError> {
        Err(AppError::Session("store offline".to_string()))
    }
}

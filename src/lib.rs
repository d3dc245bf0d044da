pub mod cache;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod policy;
pub mod redis_client;
pub mod services;
pub mod session;

use axum::{middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::services::cart::CartService;
use crate::session::{MemorySessionStore, RedisSessionStore, SessionBackend};

// Shared state для всего приложения
pub struct AppState {
    pub db: database::Database,
    pub sessions: SessionBackend,
    pub carts: CartService<SessionBackend>,
    pub cache: cache::CacheService,
    pub config: config::Config,
}

impl AppState {
    /// Подключается к Postgres и, если задан `REDIS_URL`, к Redis.
    pub async fn new(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let db = database::Database::new(&config.database.url, config.database.pool_size).await?;
        info!("Database connected");

        let redis = match &config.redis.url {
            Some(url) => {
                let client = redis_client::RedisClient::new(url).await?;
                info!("Redis connected");
                Some(client)
            }
            None => {
                info!("REDIS_URL not set: in-memory sessions, catalogue cache disabled");
                None
            }
        };

        Ok(Self::from_parts(config, db, redis))
    }

    /// Assembles the state from ready connections. Without Redis, sessions
    /// live in process memory.
    pub fn from_parts(
        config: config::Config,
        db: database::Database,
        redis: Option<redis_client::RedisClient>,
    ) -> Arc<Self> {
        let sessions = match &redis {
            Some(client) => SessionBackend::Redis(RedisSessionStore::new(
                client.clone(),
                config.session.idle_seconds(),
            )),
            None => SessionBackend::Memory(MemorySessionStore::new(Duration::from_secs(
                config.session.idle_seconds(),
            ))),
        };
        let cache = cache::CacheService::new(redis, db.clone(), config.cache.events_ttl_seconds);

        Arc::new(Self {
            db,
            carts: CartService::new(sessions.clone()),
            sessions,
            cache,
            config,
        })
    }
}

/// Полный роутер приложения.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = if state.config.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/", get(|| async { "Ticket Shop API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes(state.config.features.enable_analytics))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session::session_layer,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRating {
    pub id: i64,
    pub event_id: i64,
    pub user_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub rating: i32,
    pub rated_at: DateTime<Utc>,
}

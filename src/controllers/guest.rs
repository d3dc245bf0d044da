//! Гостевой вход по email и просмотр покупок без аккаунта.

use crate::database::Database;
use crate::error::{ApiResult, AppError};
use crate::middleware::SessionId;
use crate::services::checkout::normalize_email;
use crate::services::history::{self, PastPurchase, TicketCard};
use crate::services::ratings::{self, Rater};
use crate::session::{keys, SessionStore};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/guest/login", post(login))
        .route("/guest/logout", post(logout))
        .route("/guest/purchases", get(my_purchases).post(lookup_purchases))
        .route("/guest/ratings", post(rate_event))
}

fn required_email(raw: Option<&str>) -> ApiResult<String> {
    let email = normalize_email(raw.unwrap_or_default());
    if email.is_empty() {
        return Err(AppError::Validation("Email is required".to_string()));
    }
    Ok(email)
}

#[derive(Debug, Deserialize)]
pub struct GuestLoginRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

async fn latest_guest_name(db: &Database, email: &str) -> Result<Option<String>, sqlx::Error> {
    let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT guest_first_name, guest_last_name FROM ticket_purchases
         WHERE LOWER(guest_email) = $1
         ORDER BY purchased_at DESC, id DESC
         LIMIT 1",
    )
    .bind(email)
    .fetch_optional(&db.pool)
    .await?;

    Ok(row.map(|(first, last)| {
        format!("{} {}", first.unwrap_or_default(), last.unwrap_or_default())
            .trim()
            .to_string()
    }))
}

/// Имя гостя: из последней покупки, затем из запроса, иначе "Guest".
pub fn pick_guest_name(from_purchase: Option<String>, supplied: Option<&str>) -> String {
    match from_purchase {
        Some(name) if !name.is_empty() => name,
        Some(_) => "Guest".to_string(),
        None => supplied
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Guest")
            .to_string(),
    }
}

async fn login(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Json(req): Json<GuestLoginRequest>,
) -> ApiResult<Json<Value>> {
    let email = required_email(req.email.as_deref())?;
    let name = pick_guest_name(latest_guest_name(&state.db, &email).await?, req.name.as_deref());

    state
        .sessions
        .set(session.as_str(), keys::GUEST_EMAIL, email.clone())
        .await?;
    state
        .sessions
        .set(session.as_str(), keys::GUEST_NAME, name.clone())
        .await?;

    info!("Guest logged in: {}", email);
    Ok(Json(json!({ "success": true, "email": email, "name": name })))
}

async fn logout(State(state): State<Arc<AppState>>, session: SessionId) -> ApiResult<Json<Value>> {
    state.sessions.remove(session.as_str(), keys::GUEST_EMAIL).await?;
    state.sessions.remove(session.as_str(), keys::GUEST_NAME).await?;
    info!("Guest logged out");
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Serialize)]
pub struct GuestPurchases {
    pub success: bool,
    pub email: String,
    pub guest_name: String,
    pub upcoming_tickets: Vec<TicketCard>,
    pub past_purchases: Vec<PastPurchase>,
}

async fn purchases_for(state: &AppState, email: String) -> ApiResult<Json<GuestPurchases>> {
    let rows = history::load_for_guest(&state.db, &email).await?;
    let Some(latest) = rows.first() else {
        return Err(AppError::NotFound("No purchases found for this email".to_string()));
    };
    let guest_name = latest.purchase.guest_name().unwrap_or_default();

    let ratings: HashMap<i64, i32> = sqlx::query_as::<_, (i64, i32)>(
        "SELECT event_id, rating FROM event_ratings WHERE LOWER(guest_email) = $1",
    )
    .bind(&email)
    .fetch_all(&state.db.pool)
    .await?
    .into_iter()
    .collect();

    let now = Utc::now();
    Ok(Json(GuestPurchases {
        success: true,
        upcoming_tickets: history::upcoming_tickets(&rows, now),
        past_purchases: history::past_purchases(&rows, &ratings, now),
        guest_name,
        email,
    }))
}

/// Покупки гостя из текущей сессии.
async fn my_purchases(State(state): State<Arc<AppState>>, session: SessionId) -> ApiResult<Json<GuestPurchases>> {
    let email = state
        .sessions
        .get(session.as_str(), keys::GUEST_EMAIL)
        .await?
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::BadRequest("Not logged in as a guest".to_string()))?;
    purchases_for(&state, email).await
}

#[derive(Debug, Deserialize)]
pub struct LookupRequest {
    pub email: Option<String>,
}

async fn lookup_purchases(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LookupRequest>,
) -> ApiResult<Json<GuestPurchases>> {
    let email = required_email(req.email.as_deref())?;
    purchases_for(&state, email).await
}

#[derive(Debug, Deserialize)]
pub struct GuestRatingRequest {
    pub event_id: i64,
    pub rating: i32,
    pub email: Option<String>,
}

async fn rate_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GuestRatingRequest>,
) -> ApiResult<Json<Value>> {
    ratings::check_rating(req.rating)?;
    let email = required_email(req.email.as_deref())?;
    ratings::rate_event(&state.db, &state.cache, &Rater::Guest(email), req.event_id, req.rating).await?;
    Ok(Json(json!({ "success": true, "message": "Rating saved!" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_name_prefers_latest_purchase() {
        assert_eq!(pick_guest_name(Some("Ada Lovelace".into()), Some("Countess")), "Ada Lovelace");
        assert_eq!(pick_guest_name(Some(String::new()), Some("Countess")), "Guest");
        assert_eq!(pick_guest_name(None, Some("  Countess ")), "Countess");
        assert_eq!(pick_guest_name(None, Some("  ")), "Guest");
        assert_eq!(pick_guest_name(None, None), "Guest");
    }

    #[test]
    fn email_is_required_and_normalized() {
        assert_eq!(required_email(Some(" Ada@Example.com ")).unwrap(), "ada@example.com");
        assert!(matches!(required_email(Some("   ")), Err(AppError::Validation(_))));
        assert!(required_email(None).is_err());
    }
}

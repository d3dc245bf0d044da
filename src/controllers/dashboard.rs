//! Личный кабинет: билеты, история покупок, свои события и профиль.

use crate::error::{ApiResult, AppError};
use crate::middleware::AuthUser;
use crate::models::User;
use crate::services::history::{self, PastPurchase, TicketCard, TICKETS_PAGE_SIZE};
use crate::services::ratings::{self, Rater};
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/dashboard/tickets", get(tickets_page))
        .route("/dashboard/profile", put(update_profile))
        .route("/dashboard/ratings", post(rate_event))
}

#[derive(Debug, Serialize, FromRow)]
pub struct OrganizerEvent {
    pub event_id: i64,
    pub title: String,
    pub date: DateTime<Utc>,
    pub ticket_price: f64,
    pub tickets_sold: i64,
    pub total_revenue: f64,
}

#[derive(Debug, Serialize)]
pub struct Profile {
    pub email: String,
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub profile_picture_url: Option<String>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Profile {
            email: user.email,
            full_name: user.full_name,
            phone_number: user.phone_number,
            date_of_birth: user.date_of_birth,
            profile_picture_url: user.profile_picture_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketsPage {
    pub tickets: Vec<TicketCard>,
    pub current_page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub upcoming: TicketsPage,
    pub history: Vec<PastPurchase>,
    pub my_events: Vec<OrganizerEvent>,
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(rename = "ticketsPage")]
    pub tickets_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

/// Upcoming tickets ordered by event date.
async fn upcoming_for(state: &AppState, user_id: Uuid) -> ApiResult<(Vec<history::PurchaseWithEvent>, Vec<TicketCard>)> {
    let mut rows = history::load_for_user(&state.db, user_id).await?;
    rows.sort_by(|a, b| a.event_date.cmp(&b.event_date));
    let upcoming = history::upcoming_tickets(&rows, Utc::now());
    Ok((rows, upcoming))
}

fn paged(upcoming: &[TicketCard], page: Option<i64>) -> TicketsPage {
    let (current_page, tickets) = history::page_of(upcoming, page.unwrap_or(1), TICKETS_PAGE_SIZE);
    TicketsPage {
        tickets,
        current_page,
        total_pages: history::total_pages(upcoming.len(), TICKETS_PAGE_SIZE),
    }
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> ApiResult<Json<Dashboard>> {
    let (rows, upcoming) = upcoming_for(&state, user.user_id).await?;

    let ratings: HashMap<i64, i32> =
        sqlx::query_as::<_, (i64, i32)>("SELECT event_id, rating FROM event_ratings WHERE user_id = $1")
            .bind(user.user_id)
            .fetch_all(&state.db.pool)
            .await?
            .into_iter()
            .collect();

    let my_events = sqlx::query_as::<_, OrganizerEvent>(
        "SELECT e.id AS event_id, e.title, e.date,
                COALESCE(e.price, 0)::FLOAT8 AS ticket_price,
                COALESCE(SUM(p.quantity), 0)::BIGINT AS tickets_sold,
                COALESCE(SUM(p.total_price), 0)::FLOAT8 AS total_revenue
         FROM events e
         LEFT JOIN ticket_purchases p ON p.event_id = e.id
         WHERE e.created_by_user_id = $1
         GROUP BY e.id
         ORDER BY e.date DESC",
    )
    .bind(user.user_id)
    .fetch_all(&state.db.pool)
    .await?;

    let profile = User::find(user.user_id, &state.db)
        .await?
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(Dashboard {
        upcoming: paged(&upcoming, query.tickets_page),
        history: history::past_purchases(&rows, &ratings, Utc::now()),
        my_events,
        profile: profile.into(),
    }))
}

async fn tickets_page(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<TicketsPage>> {
    let (_, upcoming) = upcoming_for(&state, user.user_id).await?;
    Ok(Json(paged(&upcoming, query.page)))
}

fn phone_chars(phone: &str) -> Result<(), ValidationError> {
    let ok = phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '+' | '(' | ')'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Invalid phone number".into()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ProfileRequest {
    #[validate(length(max = 100, message = "Full name must be at most 100 characters"))]
    pub full_name: Option<String>,
    #[validate(
        length(max = 20, message = "Phone number must be at most 20 characters"),
        custom(function = "phone_chars")
    )]
    pub phone_number: Option<String>,
    /// `YYYY-MM-DD`
    pub date_of_birth: Option<String>,
    #[validate(length(max = 256, message = "Profile picture URL is too long"))]
    pub profile_picture_url: Option<String>,
}

fn blank_to_none(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl ProfileRequest {
    fn date_of_birth(&self) -> ApiResult<Option<NaiveDate>> {
        match blank_to_none(self.date_of_birth.as_deref()) {
            None => Ok(None),
            Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map(Some)
                .map_err(|_| AppError::Validation("Invalid date format".to_string())),
        }
    }
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<ProfileRequest>,
) -> ApiResult<Json<Value>> {
    req.validate()?;
    let date_of_birth = req.date_of_birth()?;

    let result = sqlx::query(
        "UPDATE users SET full_name = $1, phone_number = $2, date_of_birth = $3,
                profile_picture_url = COALESCE($4, profile_picture_url)
         WHERE id = $5",
    )
    .bind(req.full_name.as_deref().map(str::trim))
    .bind(blank_to_none(req.phone_number.as_deref()))
    .bind(date_of_birth)
    .bind(blank_to_none(req.profile_picture_url.as_deref()))
    .bind(user.user_id)
    .execute(&state.db.pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("No changes were saved".to_string()));
    }

    if let Err(e) = state.cache.invalidate_user_auth(&user.email).await {
        tracing::warn!("auth cache invalidation failed: {}", e);
    }
    info!("User {} updated their profile", user.user_id);
    Ok(Json(json!({ "success": true, "message": "Profile updated!" })))
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub event_id: i64,
    pub rating: i32,
}

async fn rate_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<RatingRequest>,
) -> ApiResult<Json<Value>> {
    ratings::rate_event(&state.db, &state.cache, &Rater::User(user.user_id), req.event_id, req.rating).await?;
    Ok(Json(json!({ "success": true, "message": "Rating saved!" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ProfileRequest {
        ProfileRequest {
            full_name: Some("Grace Hopper".to_string()),
            phone_number: Some("+1 (555) 010-2000".to_string()),
            date_of_birth: Some("1906-12-09".to_string()),
            profile_picture_url: None,
        }
    }

    #[test]
    fn profile_with_valid_fields_passes() {
        let req = request();
        assert!(req.validate().is_ok());
        assert_eq!(req.date_of_birth().unwrap(), NaiveDate::from_ymd_opt(1906, 12, 9));
    }

    #[test]
    fn phone_with_letters_is_rejected() {
        let mut req = request();
        req.phone_number = Some("call me".to_string());
        let err: AppError = req.validate().unwrap_err().into();
        assert_eq!(err.to_string(), "Invalid phone number");
    }

    #[test]
    fn blank_date_clears_and_bad_date_fails() {
        let mut req = request();
        req.date_of_birth = Some("  ".to_string());
        assert_eq!(req.date_of_birth().unwrap(), None);

        req.date_of_birth = Some("09/12/1906".to_string());
        assert!(req.date_of_birth().is_err());
    }

    #[test]
    fn tickets_page_reports_clamped_page() {
        let cards: Vec<TicketCard> = (0..6)
            .map(|i| TicketCard {
                purchase_id: i,
                event_id: i,
                event_title: "Show".to_string(),
                event_date: Utc::now(),
                quantity: 1,
                total_price: 5.0,
                ticket_code: String::new(),
            })
            .collect();

        let page = paged(&cards, Some(7));
        assert_eq!(page.current_page, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.tickets.len(), 2);
    }
}

//! Каталог событий: список с фильтрами, карточка события и управление.

use crate::error::{ApiResult, AppError};
use crate::middleware::AuthUser;
use crate::models::event::{ALL_CATEGORIES, EVENT_COLUMNS};
use crate::models::{Event, Role, User, EVENT_CATEGORIES};
use crate::policy;
use crate::services::event_filter::{self, EventCard, EventFilter, EventsQuery};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/live-search", get(live_search))
        .route("/events/categories", get(categories))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub success: bool,
    pub count: usize,
    pub sort: event_filter::SortKey,
    pub events: Vec<EventCard>,
}

async fn run_pipeline(state: &AppState, filter: EventFilter) -> ApiResult<Json<EventsResponse>> {
    let catalogue = state.cache.get_catalogue().await?;
    let events = event_filter::filter_and_sort(&catalogue, &filter, Utc::now());
    Ok(Json(EventsResponse {
        success: true,
        count: events.len(),
        sort: filter.sort,
        events,
    }))
}

/// GET /api/events
async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    run_pipeline(&state, EventFilter::from(&params)).await
}

/// Живой поиск по мере ввода; price bounds are not part of it.
async fn live_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let filter = EventFilter {
        min_price: None,
        max_price: None,
        ..EventFilter::from(&params)
    };
    run_pipeline(&state, filter).await
}

async fn categories() -> Json<Vec<&'static str>> {
    let mut all = vec![ALL_CATEGORIES];
    all.extend(EVENT_CATEGORIES);
    Json(all)
}

async fn get_event(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<EventCard>> {
    let catalogue = state.cache.get_catalogue().await?;
    let summary = catalogue
        .iter()
        .find(|s| s.event.id == id)
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    Ok(Json(EventCard::from_summary(summary, Utc::now())))
}

fn known_category(category: &str) -> Result<(), ValidationError> {
    if EVENT_CATEGORIES.contains(&category) {
        Ok(())
    } else {
        Err(ValidationError::new("category").with_message("Unknown category".into()))
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct EventRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required (up to 200 characters)"))]
    pub title: String,
    /// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM[:SS]` or RFC 3339; stored as UTC.
    pub date: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
    #[validate(range(min = 0.0, max = 999999.0, message = "Price must be between 0 and 999999"))]
    pub price: Option<f64>,
    #[validate(range(min = 0, message = "Ticket count must be positive."))]
    pub available_tickets: i32,
    #[validate(
        length(max = 100, message = "Category must be at most 100 characters"),
        custom(function = "known_category")
    )]
    pub category: Option<String>,
    #[validate(length(max = 500, message = "Image URL must be at most 500 characters"))]
    pub image_url: Option<String>,
}

impl EventRequest {
    fn parsed_date(&self) -> ApiResult<chrono::DateTime<Utc>> {
        event_filter::parse_date_param(&self.date)
            .ok_or_else(|| AppError::Validation("Date is invalid".to_string()))
    }
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<EventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    req.validate()?;
    let date = req.parsed_date()?;

    let event = sqlx::query_as::<_, Event>(&format!(
        "INSERT INTO events AS e
             (title, date, description, price, available_tickets, category, image_url, created_by_user_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {}",
        EVENT_COLUMNS
    ))
    .bind(req.title.trim())
    .bind(date)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.available_tickets)
    .bind(&req.category)
    .bind(&req.image_url)
    .bind(user.user_id)
    .fetch_one(&state.db.pool)
    .await?;

    if User::add_role(user.user_id, Role::Organizer, &state.db).await? {
        info!("{} became an organizer", user.email);
        if let Err(e) = state.cache.invalidate_user_auth(&user.email).await {
            warn!("auth cache invalidation failed: {}", e);
        }
    }

    state.cache.invalidate_catalogue().await;
    info!("event {} '{}' created by {}", event.id, event.title, user.email);
    Ok((StatusCode::CREATED, Json(event)))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<EventRequest>,
) -> ApiResult<Json<Event>> {
    let existing = Event::find(id, &state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !policy::can_manage_event(&user, existing.created_by_user_id) {
        warn!("{} tried to edit event {} without permission", user.email, id);
        return Err(AppError::Forbidden("Not authorized".to_string()));
    }

    req.validate()?;
    let date = req.parsed_date()?;

    // Создатель не меняется, картинка остается прежней, если новая не передана
    let image_url = req.image_url.clone().or(existing.image_url);

    let event = sqlx::query_as::<_, Event>(&format!(
        "UPDATE events AS e
         SET title = $1, date = $2, description = $3, price = $4,
             available_tickets = $5, category = $6, image_url = $7
         WHERE e.id = $8
         RETURNING {}",
        EVENT_COLUMNS
    ))
    .bind(req.title.trim())
    .bind(date)
    .bind(&req.description)
    .bind(req.price)
    .bind(req.available_tickets)
    .bind(&req.category)
    .bind(image_url)
    .bind(id)
    .fetch_one(&state.db.pool)
    .await?;

    state.cache.invalidate_catalogue().await;
    info!("event {} updated by {}", id, user.email);
    Ok(Json(event))
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let existing = Event::find(id, &state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if !policy::can_manage_event(&user, existing.created_by_user_id) {
        warn!("{} tried to delete event {} without permission", user.email, id);
        return Err(AppError::Forbidden("Not authorized".to_string()));
    }

    // Покупки, оценки и комментарии удаляются каскадно
    sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await?;

    state.cache.invalidate_catalogue().await;
    info!("event {} '{}' deleted by {}", id, existing.title, user.email);
    Ok(Json(json!({ "success": true, "message": "Event deleted" })))
}

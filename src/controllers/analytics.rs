//! analytics.rs
//!
//! Модуль аналитики продаж для организаторов и администраторов.
//!
//! Включает в себя следующую функциональность:
//! - Продажи билетов по категориям событий.
//! - Выручка по месяцам за последние 12 месяцев.
//! - Пять самых продаваемых событий.
//!
//! Организатор видит только свои события, администратор видит все.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sqlx::FromRow;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::middleware::AuthUser;
use crate::policy;
use crate::AppState;

/// Определяет маршруты, связанные с аналитикой.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analytics/sales-by-category", get(sales_by_category))
        .route("/analytics/revenue-by-month", get(revenue_by_month))
        .route("/analytics/top-events", get(top_events))
}

// --- Вспомогательные функции ---

/// Владелец, по которому фильтруются события; `None` для администратора.
fn scope(user: &AuthUser) -> ApiResult<Option<Uuid>> {
    policy::require_organizer_or_admin(user)?;
    Ok(if policy::is_admin(user) {
        None
    } else {
        Some(user.user_id)
    })
}

// --- Аналитика ---

#[derive(Debug, Serialize, FromRow)]
pub struct CategorySales {
    pub category: String,
    pub tickets_sold: i64,
}

/// GET /api/analytics/sales-by-category
///
/// События без категории попадают в "Uncategorized".
async fn sales_by_category(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Json<Vec<CategorySales>>> {
    let owner = scope(&user)?;
    let rows = sqlx::query_as::<_, CategorySales>(
        r#"
        SELECT COALESCE(e.category, 'Uncategorized') AS category,
               SUM(p.quantity)::BIGINT AS tickets_sold
        FROM ticket_purchases p
        JOIN events e ON e.id = p.event_id
        WHERE ($1::UUID IS NULL OR e.created_by_user_id = $1)
        GROUP BY COALESCE(e.category, 'Uncategorized')
        ORDER BY tickets_sold DESC, category
        "#,
    )
    .bind(owner)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize, FromRow)]
pub struct MonthRevenue {
    /// `YYYY-MM`
    pub label: String,
    pub revenue: f64,
}

/// GET /api/analytics/revenue-by-month
///
/// Текущий месяц и одиннадцать предыдущих, по возрастанию.
async fn revenue_by_month(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Json<Vec<MonthRevenue>>> {
    let owner = scope(&user)?;
    let rows = sqlx::query_as::<_, MonthRevenue>(
        r#"
        SELECT TO_CHAR(DATE_TRUNC('month', p.purchased_at AT TIME ZONE 'UTC'), 'YYYY-MM') AS label,
               SUM(p.total_price)::FLOAT8 AS revenue
        FROM ticket_purchases p
        JOIN events e ON e.id = p.event_id
        WHERE ($1::UUID IS NULL OR e.created_by_user_id = $1)
          AND p.purchased_at >= NOW() - INTERVAL '11 months'
        GROUP BY label
        ORDER BY label
        "#,
    )
    .bind(owner)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(Json(rows))
}

#[derive(Debug, Serialize, FromRow)]
pub struct TopEvent {
    pub event_id: i64,
    pub event_title: String,
    pub tickets_sold: i64,
    pub total_revenue: f64,
}

/// GET /api/analytics/top-events
async fn top_events(State(state): State<Arc<AppState>>, user: AuthUser) -> ApiResult<Json<Vec<TopEvent>>> {
    let owner = scope(&user)?;
    let rows = sqlx::query_as::<_, TopEvent>(
        r#"
        SELECT e.id AS event_id,
               e.title AS event_title,
               SUM(p.quantity)::BIGINT AS tickets_sold,
               SUM(p.total_price)::FLOAT8 AS total_revenue
        FROM ticket_purchases p
        JOIN events e ON e.id = p.event_id
        WHERE ($1::UUID IS NULL OR e.created_by_user_id = $1)
        GROUP BY e.id, e.title
        ORDER BY tickets_sold DESC, e.id
        LIMIT 5
        "#,
    )
    .bind(owner)
    .fetch_all(&state.db.pool)
    .await?;
    Ok(Json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn user(roles: &[Role]) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            email: "org@example.com".to_string(),
            full_name: None,
            roles: roles.to_vec(),
        }
    }

    #[test]
    fn organizers_are_scoped_to_their_events() {
        let organizer = user(&[Role::Organizer]);
        assert_eq!(scope(&organizer).unwrap(), Some(organizer.user_id));
    }

    #[test]
    fn admins_see_everything() {
        assert_eq!(scope(&user(&[Role::Admin, Role::Organizer])).unwrap(), None);
    }

    #[test]
    fn attendees_are_forbidden() {
        assert!(scope(&user(&[Role::Attendee])).is_err());
    }
}

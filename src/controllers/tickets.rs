use crate::error::{ApiResult, AppError};
use crate::middleware::{MaybeUser, SessionId};
use crate::models::purchase::PURCHASE_COLUMNS;
use crate::models::TicketPurchase;
use crate::services::checkout::{self, GuestDetails, PurchaseLine};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::FromRow;
use std::sync::Arc;

use super::cart::buyer_for;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets/buy", post(buy_tickets))
        .route("/tickets/receipt/{id}", get(receipt))
}

#[derive(Debug, Deserialize)]
pub struct BuyTicketsRequest {
    pub event_id: i64,
    pub quantity: i32,
    #[serde(flatten)]
    pub guest: GuestDetails,
}

/// Покупка без корзины, тем же транзакционным путем.
async fn buy_tickets(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    MaybeUser(user): MaybeUser,
    Json(req): Json<BuyTicketsRequest>,
) -> ApiResult<Json<Value>> {
    let buyer = buyer_for(user.as_ref(), req.guest)?;
    let line = PurchaseLine {
        event_id: req.event_id,
        quantity: req.quantity,
    };

    let purchases = checkout::purchase(&state.db, &buyer, &[line]).await?;
    let purchase = purchases
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Internal("purchase returned no rows".to_string()))?;

    state.cache.invalidate_catalogue().await;
    checkout::settle_session(&state.carts, &state.sessions, session.as_str(), &buyer, false).await;

    Ok(Json(json!({
        "success": true,
        "purchase_id": purchase.id,
        "event_id": purchase.event_id,
        "quantity": purchase.quantity,
        "total_price": purchase.total_price,
        "ticket_code": purchase.ticket_code(),
    })))
}

#[derive(Debug, FromRow)]
struct ReceiptRow {
    #[sqlx(flatten)]
    purchase: TicketPurchase,
    event_title: Option<String>,
    event_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Receipt {
    pub purchase_id: i64,
    pub event_id: i64,
    pub event_title: String,
    pub event_date: Option<DateTime<Utc>>,
    pub purchased_at: DateTime<Utc>,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub guest_name: Option<String>,
    pub guest_email: Option<String>,
    pub ticket_code: String,
}

impl From<ReceiptRow> for Receipt {
    fn from(row: ReceiptRow) -> Self {
        let p = row.purchase;
        Receipt {
            purchase_id: p.id,
            event_id: p.event_id,
            event_title: row.event_title.unwrap_or_else(|| "(deleted event)".to_string()),
            event_date: row.event_date,
            purchased_at: p.purchased_at,
            quantity: p.quantity,
            unit_price: p.unit_price,
            total_price: p.total_price,
            guest_name: p.guest_name(),
            ticket_code: p.ticket_code(),
            guest_email: p.guest_email,
        }
    }
}

async fn receipt(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<Receipt>> {
    let row = sqlx::query_as::<_, ReceiptRow>(&format!(
        "SELECT {}, e.title AS event_title, e.date AS event_date
         FROM ticket_purchases p
         LEFT JOIN events e ON e.id = p.event_id
         WHERE p.id = $1",
        PURCHASE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Purchase not found".to_string()))?;

    Ok(Json(Receipt::from(row)))
}

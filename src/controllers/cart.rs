//! Корзина и оформление заказа.

use crate::error::{ApiResult, AppError};
use crate::middleware::{MaybeUser, SessionId};
use crate::models::{CartItem, Event, ShoppingCart};
use crate::services::checkout::{self, Buyer, GuestDetails, PurchaseLine};
use crate::session::{keys, SessionStore};
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use super::money;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cart", get(get_cart))
        .route("/cart/count", get(cart_count))
        .route("/cart/summary", get(cart_summary))
        .route("/cart/add", post(add_to_cart))
        .route("/cart/update", post(update_quantity))
        .route("/cart/remove", post(remove_from_cart))
        .route("/cart/clear", post(clear_cart))
        .route("/cart/checkout", get(checkout_page).post(process_checkout))
}

#[derive(Debug, Serialize)]
pub struct CartLineView {
    pub event_id: i64,
    pub title: String,
    pub event_date: chrono::DateTime<chrono::Utc>,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub available_tickets: i32,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub total_items: i32,
    pub total_price: f64,
}

impl From<&ShoppingCart> for CartView {
    fn from(cart: &ShoppingCart) -> Self {
        CartView {
            items: cart
                .items
                .iter()
                .map(|i| CartLineView {
                    event_id: i.event_id,
                    title: i.event_title.clone(),
                    event_date: i.event_date,
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                    total_price: i.total_price(),
                    available_tickets: i.available_tickets,
                })
                .collect(),
            total_items: cart.total_items(),
            total_price: cart.total_price(),
        }
    }
}

async fn get_cart(State(state): State<Arc<AppState>>, session: SessionId) -> Json<CartView> {
    let cart = state.carts.get_cart(session.as_str()).await;
    Json(CartView::from(&cart))
}

async fn cart_count(State(state): State<Arc<AppState>>, session: SessionId) -> Json<Value> {
    Json(json!({ "count": state.carts.item_count(session.as_str()).await }))
}

async fn cart_summary(State(state): State<Arc<AppState>>, session: SessionId) -> Json<Value> {
    let cart = state.carts.get_cart(session.as_str()).await;
    Json(json!({
        "count": cart.total_items(),
        "total": money(cart.total_price()),
    }))
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub event_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

/// Rejects an add that would take the line past the event's stock. Counted
/// in i64 so a huge requested quantity cannot wrap.
fn ensure_room(in_cart: i32, requested: i32, available: i32) -> ApiResult<()> {
    if i64::from(in_cart) + i64::from(requested) > i64::from(available) {
        return Err(AppError::BadRequest(format!(
            "Only {} more tickets available",
            (i64::from(available) - i64::from(in_cart)).max(0)
        )));
    }
    Ok(())
}

async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Json(req): Json<AddToCartRequest>,
) -> ApiResult<Json<Value>> {
    if req.quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }

    let event = Event::find(req.event_id, &state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    if event.available_tickets <= 0 {
        return Err(AppError::BadRequest("No tickets available".to_string()));
    }

    let cart = state.carts.get_cart(session.as_str()).await;
    let current = cart.line(event.id).map(|l| l.quantity).unwrap_or(0);
    if let Err(e) = ensure_room(current, req.quantity, event.available_tickets) {
        warn!(
            "cart add rejected for event {}: {} in cart, {} requested, {} left",
            event.id, current, req.quantity, event.available_tickets
        );
        return Err(e);
    }

    state
        .carts
        .add_to_cart(
            session.as_str(),
            CartItem {
                event_id: event.id,
                event_title: event.title,
                event_date: event.date,
                unit_price: event.price.unwrap_or(0.0),
                quantity: req.quantity,
                available_tickets: event.available_tickets,
            },
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Added to cart!",
        "count": state.carts.item_count(session.as_str()).await,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub event_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct CartLineRequest {
    pub event_id: i64,
}

async fn cart_totals(state: &AppState, session: &SessionId) -> Json<Value> {
    let cart = state.carts.get_cart(session.as_str()).await;
    Json(json!({
        "success": true,
        "count": cart.total_items(),
        "total": money(cart.total_price()),
    }))
}

async fn update_quantity(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Json(req): Json<UpdateQuantityRequest>,
) -> ApiResult<Json<Value>> {
    state
        .carts
        .update_quantity(session.as_str(), req.event_id, req.quantity)
        .await?;
    Ok(cart_totals(&state, &session).await)
}

async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Json(req): Json<CartLineRequest>,
) -> ApiResult<Json<Value>> {
    state.carts.remove_from_cart(session.as_str(), req.event_id).await?;
    Ok(cart_totals(&state, &session).await)
}

async fn clear_cart(State(state): State<Arc<AppState>>, session: SessionId) -> ApiResult<Json<Value>> {
    state.carts.clear_cart(session.as_str()).await?;
    Ok(cart_totals(&state, &session).await)
}

async fn checkout_page(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    MaybeUser(user): MaybeUser,
) -> ApiResult<Json<Value>> {
    let cart = state.carts.get_cart(session.as_str()).await;
    let is_guest = user.is_none();

    let (guest_email, guest_name) = if is_guest {
        (
            state.sessions.get(session.as_str(), keys::GUEST_EMAIL).await?,
            state.sessions.get(session.as_str(), keys::GUEST_NAME).await?,
        )
    } else {
        (None, None)
    };

    Ok(Json(json!({
        "cart": CartView::from(&cart),
        "is_guest": is_guest,
        "guest_email": guest_email,
        "guest_name": guest_name,
    })))
}

/// Гость обязан указать имя, фамилию и email; for members the body may be
/// empty.
#[derive(Debug, Default, Deserialize)]
pub struct CheckoutRequest {
    pub guest_first_name: Option<String>,
    pub guest_last_name: Option<String>,
    pub guest_email: Option<String>,
}

impl CheckoutRequest {
    pub fn guest_details(&self) -> GuestDetails {
        GuestDetails {
            first_name: self.guest_first_name.clone().unwrap_or_default(),
            last_name: self.guest_last_name.clone().unwrap_or_default(),
            email: self.guest_email.clone().unwrap_or_default(),
        }
    }
}

/// Resolves who is paying. Guests get their details validated and
/// normalized.
pub(crate) fn buyer_for(user: Option<&crate::middleware::AuthUser>, guest: GuestDetails) -> ApiResult<Buyer> {
    match user {
        Some(user) => Ok(Buyer::User(user.user_id)),
        None => Ok(Buyer::Guest(guest.normalized()?)),
    }
}

async fn process_checkout(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    MaybeUser(user): MaybeUser,
    body: Option<Json<CheckoutRequest>>,
) -> ApiResult<Json<Value>> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let cart = state.carts.load(session.as_str()).await?;
    if cart.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".to_string()));
    }

    let buyer = buyer_for(user.as_ref(), req.guest_details())?;
    let purchases = checkout::purchase(&state.db, &buyer, &PurchaseLine::from_cart(&cart)).await?;

    // Покупка уже зафиксирована: дальше только кеш и сессия, без ошибок
    state.cache.invalidate_catalogue().await;
    checkout::settle_session(&state.carts, &state.sessions, session.as_str(), &buyer, true).await;

    let total_items: i32 = purchases.iter().map(|p| p.quantity).sum();
    let total_price: f64 = purchases.iter().map(|p| p.total_price).sum();
    let tickets: Vec<Value> = purchases
        .iter()
        .map(|p| {
            json!({
                "purchase_id": p.id,
                "event_id": p.event_id,
                "quantity": p.quantity,
                "total_price": p.total_price,
                "ticket_code": p.ticket_code(),
            })
        })
        .collect();

    Ok(Json(json!({
        "success": true,
        "message": "Purchase completed!",
        "total_items": total_items,
        "total_price": money(total_price),
        "purchases": tickets,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_within_stock_is_allowed() {
        assert!(ensure_room(2, 3, 5).is_ok());
    }

    #[test]
    fn add_past_stock_reports_what_is_left() {
        let err = ensure_room(2, 4, 5).unwrap_err();
        assert_eq!(err.to_string(), "Only 3 more tickets available");
    }

    #[test]
    fn huge_quantity_does_not_wrap_past_the_check() {
        let err = ensure_room(1, i32::MAX, 10).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(err.to_string(), "Only 9 more tickets available");
    }
}

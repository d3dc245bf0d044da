//! Cart engine: the shopping cart of one session, stored as JSON in the
//! session store under [`keys::CART`].

use crate::error::AppError;
use crate::models::{CartItem, ShoppingCart};
use crate::session::{keys, SessionStore};
use tracing::warn;

#[derive(Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S: SessionStore> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Текущая корзина. Missing, undecodable or unreachable state reads as
    /// an empty cart.
    pub async fn get_cart(&self, session_id: &str) -> ShoppingCart {
        match self.load(session_id).await {
            Ok(cart) => cart,
            Err(e) => {
                warn!("cart read failed for session {}: {}", session_id, e);
                ShoppingCart::default()
            }
        }
    }

    pub async fn add_to_cart(&self, session_id: &str, item: CartItem) -> Result<(), AppError> {
        let mut cart = self.load(session_id).await?;
        cart.add(item);
        self.save(session_id, &cart).await
    }

    pub async fn update_quantity(&self, session_id: &str, event_id: i64, quantity: i32) -> Result<(), AppError> {
        let mut cart = self.load(session_id).await?;
        if cart.set_quantity(event_id, quantity) {
            self.save(session_id, &cart).await?;
        }
        Ok(())
    }

    pub async fn remove_from_cart(&self, session_id: &str, event_id: i64) -> Result<(), AppError> {
        let mut cart = self.load(session_id).await?;
        cart.remove(event_id);
        self.save(session_id, &cart).await
    }

    pub async fn clear_cart(&self, session_id: &str) -> Result<(), AppError> {
        self.store.remove(session_id, keys::CART).await
    }

    pub async fn item_count(&self, session_id: &str) -> i32 {
        self.get_cart(session_id).await.total_items()
    }

    /// Like [`Self::get_cart`], but a store outage is an error. Checkout
    /// uses this so an unreachable store is not mistaken for an empty cart.
    pub async fn load(&self, session_id: &str) -> Result<ShoppingCart, AppError> {
        let Some(json) = self.store.get(session_id, keys::CART).await? else {
            return Ok(ShoppingCart::default());
        };
        if json.is_empty() {
            return Ok(ShoppingCart::default());
        }
        Ok(serde_json::from_str(&json).unwrap_or_else(|e| {
            warn!("discarding undecodable cart for session {}: {}", session_id, e);
            ShoppingCart::default()
        }))
    }

    async fn save(&self, session_id: &str, cart: &ShoppingCart) -> Result<(), AppError> {
        let json = serde_json::to_string(cart)
            .map_err(|e| AppError::Internal(format!("cart serialization: {}", e)))?;
        self.store.set(session_id, keys::CART, json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use chrono::Utc;
    use std::time::Duration;

    fn service() -> (CartService<MemorySessionStore>, MemorySessionStore) {
        let store = MemorySessionStore::new(Duration::from_secs(1800));
        (CartService::new(store.clone()), store)
    }

    fn item(event_id: i64, quantity: i32, available: i32) -> CartItem {
        CartItem {
            event_id,
            event_title: "Rooftop Festival".to_string(),
            event_date: Utc::now(),
            unit_price: 40.0,
            quantity,
            available_tickets: available,
        }
    }

    #[tokio::test]
    async fn empty_session_has_empty_cart() {
        let (carts, _) = service();
        assert!(carts.get_cart("fresh").await.is_empty());
        assert_eq!(carts.item_count("fresh").await, 0);
    }

    #[tokio::test]
    async fn add_merges_and_persists() {
        let (carts, _) = service();
        carts.add_to_cart("s", item(5, 1, 3)).await.unwrap();
        carts.add_to_cart("s", item(5, 5, 3)).await.unwrap();

        let cart = carts.get_cart("s").await;
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(carts.item_count("s").await, 3);
    }

    #[tokio::test]
    async fn update_to_zero_removes_line() {
        let (carts, _) = service();
        carts.add_to_cart("s", item(5, 2, 3)).await.unwrap();
        carts.update_quantity("s", 5, 0).await.unwrap();

        assert_eq!(carts.item_count("s").await, 0);
    }

    #[tokio::test]
    async fn update_of_absent_event_does_not_write() {
        let (carts, store) = service();
        carts.update_quantity("s", 5, 2).await.unwrap();
        assert_eq!(store.get("s", keys::CART).await.unwrap(), None);
    }

    #[tokio::test]
    async fn remove_and_clear() {
        let (carts, store) = service();
        carts.add_to_cart("s", item(1, 1, 3)).await.unwrap();
        carts.add_to_cart("s", item(2, 2, 3)).await.unwrap();

        carts.remove_from_cart("s", 1).await.unwrap();
        assert_eq!(carts.item_count("s").await, 2);

        carts.clear_cart("s").await.unwrap();
        assert_eq!(store.get("s", keys::CART).await.unwrap(), None);
        assert!(carts.get_cart("s").await.is_empty());
    }

    #[tokio::test]
    async fn sessions_do_not_share_carts() {
        let (carts, _) = service();
        carts.add_to_cart("a", item(1, 1, 3)).await.unwrap();
        assert!(carts.get_cart("b").await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_blob_reads_as_empty_cart() {
        let (carts, store) = service();
        store
            .set("s", keys::CART, "{not json".to_string())
            .await
            .unwrap();

        assert!(carts.get_cart("s").await.is_empty());
        carts.add_to_cart("s", item(1, 2, 3)).await.unwrap();
        assert_eq!(carts.item_count("s").await, 2);
    }

    #[tokio::test]
    async fn store_outage_is_an_error_only_on_the_fallible_path() {
        let carts = CartService::new(crate::session::UnavailableStore);

        assert!(carts.get_cart("s").await.is_empty());
        assert!(matches!(carts.load("s").await, Err(AppError::Session(_))));
    }
}

//! Корзина покупателя.
//!
//! Lines are unique by event id and every mutation keeps
//! `quantity <= available_tickets`. Nothing here rejects input: quantities
//! are clamped, and the checkout transaction re-checks live stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub event_id: i64,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
    pub unit_price: f64,
    pub quantity: i32,
    pub available_tickets: i32,
}

impl CartItem {
    pub fn total_price(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShoppingCart {
    pub items: Vec<CartItem>,
}

impl ShoppingCart {
    pub fn total_items(&self) -> i32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn total_price(&self) -> f64 {
        self.items.iter().map(CartItem::total_price).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self, event_id: i64) -> Option<&CartItem> {
        self.items.iter().find(|i| i.event_id == event_id)
    }

    /// Merges `item` into the cart.
    ///
    /// An existing line grows to `min(existing + item.quantity,
    /// item.available_tickets)` and takes the fresher stock figure; a new
    /// line is appended with its quantity capped the same way. A line whose
    /// capped quantity is not positive is dropped.
    pub fn add(&mut self, mut item: CartItem) {
        if let Some(pos) = self.items.iter().position(|i| i.event_id == item.event_id) {
            let existing = &mut self.items[pos];
            let merged = existing.quantity.saturating_add(item.quantity);
            existing.quantity = merged.min(item.available_tickets);
            existing.available_tickets = item.available_tickets;
            if existing.quantity <= 0 {
                self.items.remove(pos);
            }
        } else {
            item.quantity = item.quantity.min(item.available_tickets);
            if item.quantity > 0 {
                self.items.push(item);
            }
        }
    }

    /// Returns false when no line matches `event_id`.
    pub fn set_quantity(&mut self, event_id: i64, quantity: i32) -> bool {
        let Some(pos) = self.items.iter().position(|i| i.event_id == event_id) else {
            return false;
        };

        if quantity <= 0 {
            self.items.remove(pos);
        } else {
            let line = &mut self.items[pos];
            line.quantity = quantity.min(line.available_tickets);
            if line.quantity <= 0 {
                self.items.remove(pos);
            }
        }
        true
    }

    pub fn remove(&mut self, event_id: i64) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.event_id != event_id);
        self.items.len() != before
    }
}

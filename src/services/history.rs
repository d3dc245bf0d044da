//! История покупок: предстоящие билеты и прошедшие события.
//!
//! Shared by the guest lookup and the member dashboard. Loading is one query
//! per caller; grouping and paging are plain functions over the rows.

use crate::database::Database;
use crate::models::purchase::PURCHASE_COLUMNS;
use crate::models::TicketPurchase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

pub const TICKETS_PAGE_SIZE: usize = 4;

/// Purchase row joined with its event; rows whose event is gone are never
/// loaded.
#[derive(Debug, Clone, FromRow)]
pub struct PurchaseWithEvent {
    #[sqlx(flatten)]
    pub purchase: TicketPurchase,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketCard {
    pub purchase_id: i64,
    pub event_id: i64,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
    pub quantity: i32,
    pub total_price: f64,
    pub ticket_code: String,
}

impl From<&PurchaseWithEvent> for TicketCard {
    fn from(row: &PurchaseWithEvent) -> Self {
        TicketCard {
            purchase_id: row.purchase.id,
            event_id: row.purchase.event_id,
            event_title: row.event_title.clone(),
            event_date: row.event_date,
            quantity: row.purchase.quantity,
            total_price: row.purchase.total_price,
            ticket_code: row.purchase.ticket_code(),
        }
    }
}

/// Одна строка на прошедшее событие.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PastPurchase {
    pub event_id: i64,
    pub event_title: String,
    pub event_date: DateTime<Utc>,
    pub quantity: i32,
    pub total_price: f64,
    pub rating: Option<i32>,
}

pub async fn load_for_user(db: &Database, user_id: Uuid) -> Result<Vec<PurchaseWithEvent>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseWithEvent>(&format!(
        "SELECT {}, e.title AS event_title, e.date AS event_date
         FROM ticket_purchases p
         JOIN events e ON e.id = p.event_id
         WHERE p.buyer_user_id = $1
         ORDER BY p.purchased_at DESC, p.id DESC",
        PURCHASE_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&db.pool)
    .await
}

/// `email` must already be normalized.
pub async fn load_for_guest(db: &Database, email: &str) -> Result<Vec<PurchaseWithEvent>, sqlx::Error> {
    sqlx::query_as::<_, PurchaseWithEvent>(&format!(
        "SELECT {}, e.title AS event_title, e.date AS event_date
         FROM ticket_purchases p
         JOIN events e ON e.id = p.event_id
         WHERE LOWER(p.guest_email) = $1
         ORDER BY p.purchased_at DESC, p.id DESC",
        PURCHASE_COLUMNS
    ))
    .bind(email)
    .fetch_all(&db.pool)
    .await
}

/// Upcoming tickets in the order the rows came in.
pub fn upcoming_tickets(rows: &[PurchaseWithEvent], now: DateTime<Utc>) -> Vec<TicketCard> {
    rows.iter()
        .filter(|r| r.event_date >= now)
        .map(TicketCard::from)
        .collect()
}

/// Past purchases summed per event, most recent event first.
pub fn past_purchases(
    rows: &[PurchaseWithEvent],
    ratings: &HashMap<i64, i32>,
    now: DateTime<Utc>,
) -> Vec<PastPurchase> {
    let mut grouped: Vec<PastPurchase> = Vec::new();
    for row in rows.iter().filter(|r| r.event_date < now) {
        match grouped.iter_mut().find(|g| g.event_id == row.purchase.event_id) {
            Some(group) => {
                group.quantity += row.purchase.quantity;
                group.total_price += row.purchase.total_price;
            }
            None => grouped.push(PastPurchase {
                event_id: row.purchase.event_id,
                event_title: row.event_title.clone(),
                event_date: row.event_date,
                quantity: row.purchase.quantity,
                total_price: row.purchase.total_price,
                rating: ratings.get(&row.purchase.event_id).copied(),
            }),
        }
    }
    grouped.sort_by(|a, b| b.event_date.cmp(&a.event_date));
    grouped
}

/// `ceil(max(1, n) / page_size)`: an empty list still has one page.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.max(1).div_ceil(page_size)
}

/// Clamps `page` into `1..=total_pages` and returns it with its slice.
pub fn page_of<T: Clone>(items: &[T], page: i64, page_size: usize) -> (usize, Vec<T>) {
    let total = total_pages(items.len(), page_size);
    let page = page.clamp(1, total as i64) as usize;
    let slice = items
        .iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .cloned()
        .collect();
    (page, slice)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(id: i64, event_id: i64, offset_days: i64, quantity: i32) -> PurchaseWithEvent {
        PurchaseWithEvent {
            purchase: TicketPurchase {
                id,
                event_id,
                quantity,
                unit_price: 10.0,
                total_price: 10.0 * f64::from(quantity),
                purchased_at: Utc::now(),
                buyer_user_id: None,
                guest_first_name: None,
                guest_last_name: None,
                guest_email: Some("guest@example.com".to_string()),
            },
            event_title: format!("Event {}", event_id),
            event_date: Utc::now() + Duration::days(offset_days),
        }
    }

    #[test]
    fn past_purchases_are_grouped_per_event_with_rating() {
        let rows = vec![row(1, 10, -2, 1), row(2, 10, -2, 3), row(3, 11, -5, 2), row(4, 12, 3, 1)];
        let ratings = HashMap::from([(10, 4)]);

        let past = past_purchases(&rows, &ratings, Utc::now());
        assert_eq!(past.len(), 2);
        assert_eq!(past[0].event_id, 10);
        assert_eq!(past[0].quantity, 4);
        assert_eq!(past[0].total_price, 40.0);
        assert_eq!(past[0].rating, Some(4));
        assert_eq!(past[1].event_id, 11);
        assert_eq!(past[1].rating, None);
    }

    #[test]
    fn upcoming_tickets_keep_row_order() {
        let rows = vec![row(5, 1, 9, 1), row(4, 2, -1, 1), row(3, 3, 1, 2)];
        let ids: Vec<i64> = upcoming_tickets(&rows, Utc::now())
            .iter()
            .map(|t| t.purchase_id)
            .collect();
        assert_eq!(ids, vec![5, 3]);
    }

    #[test]
    fn paging_clamps_into_range() {
        let items: Vec<i32> = (1..=9).collect();
        assert_eq!(total_pages(items.len(), 4), 3);
        assert_eq!(page_of(&items, 2, 4), (2, vec![5, 6, 7, 8]));
        assert_eq!(page_of(&items, 99, 4), (3, vec![9]));
        assert_eq!(page_of(&items, -3, 4), (1, vec![1, 2, 3, 4]));
    }

    #[test]
    fn empty_list_has_one_page() {
        let items: Vec<i32> = Vec::new();
        assert_eq!(total_pages(0, 4), 1);
        assert_eq!(page_of(&items, 5, 4), (1, vec![]));
    }
}

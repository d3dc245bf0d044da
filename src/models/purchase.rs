use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TicketPurchase {
    pub id: i64,
    pub event_id: i64,
    pub quantity: i32,
    pub unit_price: f64,
    pub total_price: f64,
    pub purchased_at: DateTime<Utc>,
    pub buyer_user_id: Option<Uuid>,
    pub guest_first_name: Option<String>,
    pub guest_last_name: Option<String>,
    pub guest_email: Option<String>,
}

pub(crate) const PURCHASE_COLUMNS: &str = "p.id, p.event_id, p.quantity, p.unit_price::FLOAT8 AS unit_price, \
     p.total_price::FLOAT8 AS total_price, p.purchased_at, p.buyer_user_id, \
     p.guest_first_name, p.guest_last_name, p.guest_email";

impl TicketPurchase {
    pub fn guest_name(&self) -> Option<String> {
        match (&self.guest_first_name, &self.guest_last_name) {
            (None, None) => None,
            (first, last) => Some(
                format!(
                    "{} {}",
                    first.as_deref().unwrap_or_default(),
                    last.as_deref().unwrap_or_default()
                )
                .trim()
                .to_string(),
            ),
        }
    }

    pub fn ticket_code(&self) -> String {
        ticket_code(self.id, self.event_id, self.quantity, self.total_price)
    }
}

/// Код билета для проверки на входе: SHA-256 от полезной нагрузки QR.
pub fn ticket_code(purchase_id: i64, event_id: i64, quantity: i32, total_price: f64) -> String {
    let payload = format!(
        "TICKET|{}|{}|{}|{:.2}",
        purchase_id, event_id, quantity, total_price
    );
    format!("{:x}", Sha256::digest(payload.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase() -> TicketPurchase {
        TicketPurchase {
            id: 42,
            event_id: 7,
            quantity: 2,
            unit_price: 10.0,
            total_price: 20.0,
            purchased_at: Utc::now(),
            buyer_user_id: None,
            guest_first_name: Some("Ada".to_string()),
            guest_last_name: Some("Lovelace".to_string()),
            guest_email: Some("ada@example.com".to_string()),
        }
    }

    #[test]
    fn ticket_code_is_stable_hex_digest() {
        let code = purchase().ticket_code();
        assert_eq!(code.len(), 64);
        assert!(code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(code, ticket_code(42, 7, 2, 20.0));
        assert_ne!(code, ticket_code(42, 7, 3, 20.0));
    }

    #[test]
    fn guest_name_joins_parts() {
        assert_eq!(purchase().guest_name().as_deref(), Some("Ada Lovelace"));

        let mut member = purchase();
        member.guest_first_name = None;
        member.guest_last_name = None;
        assert_eq!(member.guest_name(), None);
    }
}

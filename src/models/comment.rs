use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Комментарий вместе с именем автора (из users, если он зарегистрирован).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventComment {
    pub id: i64,
    pub event_id: i64,
    pub user_id: Option<Uuid>,
    pub guest_name: Option<String>,
    pub author_full_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl EventComment {
    pub fn display_name(&self) -> &str {
        self.author_full_name
            .as_deref()
            .or(self.guest_name.as_deref())
            .unwrap_or("Anonymous")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_member_then_guest() {
        let mut comment = EventComment {
            id: 1,
            event_id: 1,
            user_id: None,
            guest_name: Some("Walk-in".to_string()),
            author_full_name: Some("Grace Hopper".to_string()),
            content: "See you there".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(comment.display_name(), "Grace Hopper");

        comment.author_full_name = None;
        assert_eq!(comment.display_name(), "Walk-in");

        comment.guest_name = None;
        assert_eq!(comment.display_name(), "Anonymous");
    }
}

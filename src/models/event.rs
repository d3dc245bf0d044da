use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Категории, которые может выбрать организатор.
pub const EVENT_CATEGORIES: [&str; 6] = [
    "Fun",
    "Festival",
    "Concert",
    "Business & Professional",
    "Webinar",
    "Community",
];

/// Sentinel category meaning "no category filter".
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub date: DateTime<Utc>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub available_tickets: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub created_by_user_id: Option<Uuid>,
}

/// Event together with its rating aggregates, as held in the catalogue cache.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EventSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub average_rating: f64,
    pub total_ratings: i64,
}

impl EventSummary {
    /// Builds the aggregates from raw rating values; mean of the values or 0.
    pub fn from_ratings(event: Event, ratings: &[i32]) -> Self {
        let total_ratings = ratings.len() as i64;
        let average_rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64
        };
        Self {
            event,
            average_rating,
            total_ratings,
        }
    }
}

pub(crate) const EVENT_COLUMNS: &str = "e.id, e.title, e.date, e.description, e.price::FLOAT8 AS price, \
     e.available_tickets, e.category, e.image_url, e.created_by_user_id";

impl Event {
    pub async fn find(id: i64, db: &crate::database::Database) -> Result<Option<Event>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events e WHERE e.id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&db.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> Event {
        Event {
            id: 1,
            title: "Jazz Night".to_string(),
            date: Utc::now(),
            description: None,
            price: Some(25.0),
            available_tickets: 10,
            category: Some("Concert".to_string()),
            image_url: None,
            created_by_user_id: None,
        }
    }

    #[test]
    fn average_rating_is_mean_of_values() {
        let summary = EventSummary::from_ratings(event(), &[4, 5]);
        assert_eq!(summary.average_rating, 4.5);
        assert_eq!(summary.total_ratings, 2);
    }

    #[test]
    fn average_rating_defaults_to_zero_without_ratings() {
        let summary = EventSummary::from_ratings(event(), &[]);
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.total_ratings, 0);
    }

    #[test]
    fn summary_serializes_flat() {
        let summary = EventSummary::from_ratings(event(), &[3]);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["title"], "Jazz Night");
        assert_eq!(json["average_rating"], 3.0);
        let back: EventSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }
}

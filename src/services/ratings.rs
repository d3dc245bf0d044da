//! Оценки событий. Rate only what you bought, and only once.

use crate::cache::CacheService;
use crate::database::Database;
use crate::error::AppError;
use crate::models::EventRating;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum Rater {
    User(Uuid),
    /// Normalized email.
    Guest(String),
}

pub fn check_rating(rating: i32) -> Result<(), AppError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(AppError::Validation("Rating must be between 1 and 5 stars".to_string()))
    }
}

pub async fn rate_event(
    db: &Database,
    cache: &CacheService,
    rater: &Rater,
    event_id: i64,
    rating: i32,
) -> Result<EventRating, AppError> {
    check_rating(rating)?;

    let (purchased_sql, rated_sql) = match rater {
        Rater::User(_) => (
            "SELECT EXISTS(SELECT 1 FROM ticket_purchases WHERE event_id = $1 AND buyer_user_id = $2)",
            "SELECT EXISTS(SELECT 1 FROM event_ratings WHERE event_id = $1 AND user_id = $2)",
        ),
        Rater::Guest(_) => (
            "SELECT EXISTS(SELECT 1 FROM ticket_purchases WHERE event_id = $1 AND LOWER(guest_email) = $2)",
            "SELECT EXISTS(SELECT 1 FROM event_ratings WHERE event_id = $1 AND LOWER(guest_email) = $2)",
        ),
    };

    let purchased = bind_rater(sqlx::query_scalar::<_, bool>(purchased_sql).bind(event_id), rater)
        .fetch_one(&db.pool)
        .await?;
    if !purchased {
        warn!("rating rejected for event {}: no purchase by {:?}", event_id, rater);
        return Err(AppError::Forbidden("You can only rate events you've attended".to_string()));
    }

    let already_rated = bind_rater(sqlx::query_scalar::<_, bool>(rated_sql).bind(event_id), rater)
        .fetch_one(&db.pool)
        .await?;
    if already_rated {
        return Err(AppError::Conflict("You have already rated this event".to_string()));
    }

    let (user_id, guest_email) = match rater {
        Rater::User(id) => (Some(*id), None),
        Rater::Guest(email) => (None, Some(email.as_str())),
    };
    let saved = sqlx::query_as::<_, EventRating>(
        "INSERT INTO event_ratings (event_id, user_id, guest_email, rating)
         VALUES ($1, $2, $3, $4)
         RETURNING id, event_id, user_id, guest_email, rating, rated_at",
    )
    .bind(event_id)
    .bind(user_id)
    .bind(guest_email)
    .bind(rating)
    .fetch_one(&db.pool)
    .await?;

    cache.invalidate_catalogue().await;
    info!("{:?} rated event {} with {} stars", rater, event_id, rating);
    Ok(saved)
}

fn bind_rater<'q>(
    query: sqlx::query::QueryScalar<'q, sqlx::Postgres, bool, sqlx::postgres::PgArguments>,
    rater: &'q Rater,
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, bool, sqlx::postgres::PgArguments> {
    match rater {
        Rater::User(id) => query.bind(*id),
        Rater::Guest(email) => query.bind(email.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_must_be_one_to_five() {
        assert!(check_rating(1).is_ok());
        assert!(check_rating(5).is_ok());
        for bad in [0, 6, -1] {
            let err = check_rating(bad).unwrap_err();
            assert_eq!(err.to_string(), "Rating must be between 1 and 5 stars");
        }
    }
}

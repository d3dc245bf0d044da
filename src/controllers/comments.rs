use crate::error::{ApiResult, AppError};
use crate::middleware::{AuthUser, MaybeUser, SessionId};
use crate::models::{Event, EventComment};
use crate::policy;
use crate::session::{keys, SessionStore};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_COMMENT_CHARS: usize = 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{id}/comments", get(list_comments).post(add_comment))
        .route("/comments/{id}", delete(delete_comment))
}

const COMMENT_SELECT: &str = "SELECT c.id, c.event_id, c.user_id, c.guest_name,
            u.full_name AS author_full_name, c.content, c.created_at
     FROM event_comments c
     LEFT JOIN users u ON u.id = c.user_id";

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub content: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub is_owner: bool,
}

impl CommentView {
    fn new(comment: &EventComment, viewer: Option<&AuthUser>) -> Self {
        CommentView {
            id: comment.id,
            content: comment.content.clone(),
            display_name: comment.display_name().to_string(),
            created_at: comment.created_at,
            is_owner: viewer.is_some_and(|u| policy::can_delete_comment(u, comment.user_id)),
        }
    }
}

/// Комментарии события, новые сверху.
async fn list_comments(
    State(state): State<Arc<AppState>>,
    MaybeUser(viewer): MaybeUser,
    Path(event_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let comments = sqlx::query_as::<_, EventComment>(&format!(
        "{} WHERE c.event_id = $1 ORDER BY c.created_at DESC, c.id DESC",
        COMMENT_SELECT
    ))
    .bind(event_id)
    .fetch_all(&state.db.pool)
    .await?;

    let views: Vec<CommentView> = comments
        .iter()
        .map(|c| CommentView::new(c, viewer.as_ref()))
        .collect();
    Ok(Json(json!({ "success": true, "comments": views })))
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub content: String,
    pub guest_name: Option<String>,
}

/// Trimmed content or the reason it cannot be posted.
pub fn clean_content(raw: &str) -> ApiResult<String> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::Validation(
            "Comment is too long (max 1000 characters)".to_string(),
        ));
    }
    Ok(content.to_string())
}

async fn add_comment(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    MaybeUser(user): MaybeUser,
    Path(event_id): Path<i64>,
    Json(req): Json<NewComment>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let content = clean_content(&req.content)?;

    Event::find(event_id, &state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    // Аноним: имя из запроса, затем из гостевой сессии, иначе "Guest"
    let guest_name = match &user {
        Some(_) => None,
        None => match req.guest_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Some(name.to_string()),
            None => Some(
                state
                    .sessions
                    .get(session.as_str(), keys::GUEST_NAME)
                    .await?
                    .unwrap_or_else(|| "Guest".to_string()),
            ),
        },
    };

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO event_comments (event_id, user_id, guest_name, content)
         VALUES ($1, $2, $3, $4)
         RETURNING id",
    )
    .bind(event_id)
    .bind(user.as_ref().map(|u| u.user_id))
    .bind(&guest_name)
    .bind(&content)
    .fetch_one(&state.db.pool)
    .await?;

    let comment = sqlx::query_as::<_, EventComment>(&format!("{} WHERE c.id = $1", COMMENT_SELECT))
        .bind(id)
        .fetch_one(&state.db.pool)
        .await?;

    let mut view = CommentView::new(&comment, user.as_ref());
    if let Some(user) = &user {
        view.display_name = user.display_name().to_string();
    }

    Ok((StatusCode::CREATED, Json(json!({ "success": true, "comment": view }))))
}

async fn delete_comment(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let author: Option<Option<uuid::Uuid>> =
        sqlx::query_scalar("SELECT user_id FROM event_comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db.pool)
            .await?;
    let author = author.ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if !policy::can_delete_comment(&user, author) {
        warn!("{} tried to delete comment {}", user.email, id);
        return Err(AppError::Forbidden("Not authorized to delete this comment".to_string()));
    }

    sqlx::query("DELETE FROM event_comments WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await?;
    info!("comment {} deleted by {}", id, user.email);
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_trimmed() {
        assert_eq!(clean_content("  see you there \n").unwrap(), "see you there");
    }

    #[test]
    fn blank_and_oversized_comments_are_rejected() {
        assert_eq!(
            clean_content("   ").unwrap_err().to_string(),
            "Comment cannot be empty"
        );
        let long = "x".repeat(MAX_COMMENT_CHARS + 1);
        assert!(clean_content(&long).is_err());
        assert!(clean_content(&"é".repeat(MAX_COMMENT_CHARS)).is_ok());
    }
}

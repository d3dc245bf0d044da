use crate::error::{ApiResult, AppError};
use crate::middleware::AuthUser;
use crate::models::{Role, User};
use crate::policy;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}/confirm-email", post(confirm_email))
        .route("/admin/users/{id}/make-admin", post(make_admin))
        .route("/admin/users/{id}", delete(delete_user))
}

#[derive(Debug, Serialize)]
pub struct AdminUserRow {
    pub id: Uuid,
    pub email: String,
    pub email_confirmed: bool,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub roles: Vec<Role>,
}

async fn find_user(state: &AppState, id: Uuid) -> ApiResult<User> {
    User::find(id, &state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found.".to_string()))
}

async fn forget_credentials(state: &AppState, email: &str) {
    if let Err(e) = state.cache.invalidate_user_auth(email).await {
        tracing::warn!("auth cache invalidation failed: {}", e);
    }
}

async fn list_users(State(state): State<Arc<AppState>>, admin: AuthUser) -> ApiResult<Json<Vec<AdminUserRow>>> {
    policy::require_admin(&admin)?;

    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY email")
        .fetch_all(&state.db.pool)
        .await?;

    let mut rows = Vec::with_capacity(users.len());
    for user in users {
        rows.push(AdminUserRow {
            roles: User::roles(user.id, &state.db).await?,
            id: user.id,
            email: user.email,
            email_confirmed: user.email_confirmed,
            full_name: user.full_name.unwrap_or_default(),
            phone_number: user.phone_number,
        });
    }
    Ok(Json(rows))
}

async fn confirm_email(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    policy::require_admin(&admin)?;
    let user = find_user(&state, id).await?;
    if user.email_confirmed {
        return Err(AppError::Conflict("Email is already confirmed.".to_string()));
    }

    sqlx::query("UPDATE users SET email_confirmed = TRUE WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await?;
    info!("{} confirmed email for {}", admin.email, user.email);
    Ok(Json(json!({
        "success": true,
        "message": format!("Email confirmed for {}.", user.email),
    })))
}

async fn make_admin(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    policy::require_admin(&admin)?;
    let user = find_user(&state, id).await?;

    if !User::add_role(id, Role::Admin, &state.db).await? {
        return Err(AppError::Conflict(format!("{} is already an admin.", user.email)));
    }
    forget_credentials(&state, &user.email).await;
    info!("{} granted Admin to {}", admin.email, user.email);
    Ok(Json(json!({
        "success": true,
        "message": format!("{} is now an admin.", user.email),
    })))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    policy::require_admin(&admin)?;
    let user = find_user(&state, id).await?;
    if user.id == admin.user_id {
        return Err(AppError::BadRequest("You cannot delete your own account.".to_string()));
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&state.db.pool)
        .await?;
    forget_credentials(&state, &user.email).await;
    info!("{} deleted user {}", admin.email, user.email);
    Ok(Json(json!({
        "success": true,
        "message": format!("User {} deleted.", user.email),
    })))
}

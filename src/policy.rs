//! Правила доступа.

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::Role;
use uuid::Uuid;

pub fn is_admin(user: &AuthUser) -> bool {
    user.has_role(Role::Admin)
}

/// Analytics is open to organizers and admins.
pub fn is_organizer_or_admin(user: &AuthUser) -> bool {
    user.has_role(Role::Organizer) || is_admin(user)
}

/// Admins manage every event; organizers only the ones they created.
pub fn can_manage_event(user: &AuthUser, owner_id: Option<Uuid>) -> bool {
    is_admin(user) || owner_id == Some(user.user_id)
}

pub fn can_delete_comment(user: &AuthUser, author_id: Option<Uuid>) -> bool {
    is_admin(user) || author_id == Some(user.user_id)
}

pub fn require_admin(user: &AuthUser) -> Result<(), AppError> {
    if is_admin(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".to_string()))
    }
}

pub fn require_organizer_or_admin(user: &AuthUser) -> Result<(), AppError> {
    if is_organizer_or_admin(user) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Organizer or Admin role required".to_string()))
    }
}

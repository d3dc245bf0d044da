//! Извлечение пользователя из запроса.
//!
//! Users authenticate with HTTP Basic credentials checked against the bcrypt
//! hash in `users.password_hash`. Verified credentials are cached briefly
//! (see `cache::auth`).

pub mod session;

use crate::error::AppError;
use crate::models::{Role, User};
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub use self::session::SessionId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub roles: Vec<Role>,
}

impl AuthUser {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// Full name when set, the email otherwise.
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Anonymous-allowed routes. Missing credentials give `None`; wrong ones are
/// still a 401.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

/// Разбирает `Authorization: Basic base64(email:password)`.
///
/// `None` when the header is absent, an error when it is present but unusable.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Result<(String, String), AppError>> {
    let value = headers.get(header::AUTHORIZATION)?;
    Some(parse_basic(value.to_str().ok()))
}

fn parse_basic(value: Option<&str>) -> Result<(String, String), AppError> {
    let encoded = value
        .and_then(|v| v.strip_prefix("Basic "))
        .ok_or(AppError::Unauthorized)?;
    let decoded = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AppError::Unauthorized)?;
    let credentials = String::from_utf8(decoded).map_err(|_| AppError::Unauthorized)?;

    let (email, password) = credentials.split_once(':').ok_or(AppError::Unauthorized)?;
    if email.is_empty() {
        return Err(AppError::Unauthorized);
    }
    Ok((email.to_string(), password.to_string()))
}

async fn authenticate(state: &AppState, email: &str, password: &str) -> Result<AuthUser, AppError> {
    match state.cache.get_cached_auth_user(email, password).await {
        Ok(Some(user)) => return Ok(user),
        Ok(None) => {}
        Err(e) => warn!("auth cache read failed: {}", e),
    }

    let user = User::find_by_email(email, &state.db)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized)?;

    let user_id = user.id;
    let password_owned = password.to_string();
    let (user, valid) = tokio::task::spawn_blocking(move || {
        let valid = user.verify_password(&password_owned);
        (user, valid)
    })
    .await
    .map_err(|e| AppError::Internal(format!("password check task failed: {}", e)))?;

    if !valid {
        warn!("rejected credentials for {}", email);
        return Err(AppError::Unauthorized);
    }

    let auth_user = AuthUser {
        user_id,
        email: user.email,
        full_name: user.full_name,
        roles: User::roles(user_id, &state.db).await?,
    };

    if let Err(e) = state.cache.cache_auth_user(password, &auth_user).await {
        warn!("auth cache write failed: {}", e);
    }
    Ok(auth_user)
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let (email, password) = basic_credentials(&parts.headers).ok_or(AppError::Unauthorized)??;
        authenticate(state, &email, &password).await
    }
}

impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        match basic_credentials(&parts.headers) {
            None => Ok(MaybeUser(None)),
            Some(credentials) => {
                let (email, password) = credentials?;
                Ok(MaybeUser(Some(authenticate(state, &email, &password).await?)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn basic_credentials_are_decoded() {
        let encoded = general_purpose::STANDARD.encode("ada@example.com:pa:ss");
        let headers = headers_with(&format!("Basic {}", encoded));

        let (email, password) = basic_credentials(&headers).unwrap().unwrap();
        assert_eq!(email, "ada@example.com");
        assert_eq!(password, "pa:ss");
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert!(basic_credentials(&HeaderMap::new()).is_none());
    }

    #[test]
    fn malformed_header_is_unauthorized() {
        for value in ["Bearer abc", "Basic !!!", "Basic bm9jb2xvbg=="] {
            let result = basic_credentials(&headers_with(value)).unwrap();
            assert!(matches!(result, Err(AppError::Unauthorized)), "{}", value);
        }
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut user = AuthUser {
            user_id: Uuid::new_v4(),
            email: "ada@example.com".to_string(),
            full_name: None,
            roles: vec![Role::Attendee],
        };
        assert_eq!(user.display_name(), "ada@example.com");
        user.full_name = Some("Ada Lovelace".to_string());
        assert_eq!(user.display_name(), "Ada Lovelace");
        assert!(user.has_role(Role::Attendee));
        assert!(!user.has_role(Role::Admin));
    }
}

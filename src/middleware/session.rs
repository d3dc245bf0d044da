//! Идентификатор сессии: cookie, затем заголовок `X-Session-Id`, иначе новый
//! UUID v4. The cookie is re-issued on every response so the idle window
//! slides with activity.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

pub const SESSION_HEADER: &str = "x-session-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for SessionId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))
    }
}

/// Value of cookie `name`, if any `Cookie` header carries it.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
}

/// Session ids are UUIDs; anything else is replaced.
pub fn resolve_session_id(headers: &HeaderMap, cookie_name: &str) -> (SessionId, bool) {
    let existing = cookie_value(headers, cookie_name)
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

    match existing {
        Some(id) => (SessionId(id.to_string()), false),
        None => (SessionId(Uuid::new_v4().to_string()), true),
    }
}

pub fn session_cookie(name: &str, id: &SessionId, max_age_seconds: u64) -> String {
    format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        name, id.0, max_age_seconds
    )
}

pub async fn session_layer(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let cookie_name = &state.config.session.cookie_name;
    let (session_id, minted) = resolve_session_id(req.headers(), cookie_name);
    if minted {
        tracing::debug!("new session {}", session_id.0);
    }
    req.extensions_mut().insert(session_id.clone());

    let mut response = next.run(req).await;

    let cookie = session_cookie(cookie_name, &session_id, state.config.session.idle_seconds());
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => warn!("cannot encode session cookie: {}", e),
    }
    if let Ok(value) = HeaderValue::from_str(&session_id.0) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "ticket_shop_session";

    #[test]
    fn cookie_wins_over_header() {
        let from_cookie = Uuid::new_v4();
        let from_header = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {}={}", NAME, from_cookie)).unwrap(),
        );
        headers.insert(SESSION_HEADER, HeaderValue::from_str(&from_header.to_string()).unwrap());

        let (id, minted) = resolve_session_id(&headers, NAME);
        assert_eq!(id.0, from_cookie.to_string());
        assert!(!minted);
    }

    #[test]
    fn header_is_used_without_cookie() {
        let from_header = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(SESSION_HEADER, HeaderValue::from_str(&from_header.to_string()).unwrap());

        assert_eq!(resolve_session_id(&headers, NAME).0 .0, from_header.to_string());
    }

    #[test]
    fn malformed_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("ticket_shop_session=../../etc"));

        let (id, minted) = resolve_session_id(&headers, NAME);
        assert!(minted);
        assert!(Uuid::parse_str(&id.0).is_ok());
    }

    #[test]
    fn cookie_attributes() {
        let cookie = session_cookie(NAME, &SessionId("abc".to_string()), 1800);
        assert_eq!(cookie, "ticket_shop_session=abc; HttpOnly; Path=/; SameSite=Lax; Max-Age=1800");
    }
}

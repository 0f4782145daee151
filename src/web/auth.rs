//! Session cookie handling for the web layer.

use super::server::AppState;
use crate::error::{ApiError, ApiResult};
use crate::types::User;
use axum::http::{HeaderMap, header};
use axum::response::Redirect;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "taskdeck_session";

/// Extract the session token from the Cookie header, if present.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

/// Set-Cookie value establishing a session.
pub fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token)
}

/// Set-Cookie value clearing the session (logout).
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE)
}

/// Resolve the requesting user for an API endpoint. No session means 401.
pub fn api_user(state: &AppState, headers: &HeaderMap) -> ApiResult<User> {
    let token = session_token(headers).ok_or_else(ApiError::unauthorized)?;
    state
        .db
        .session_user(&token)
        .map_err(ApiError::from)?
        .ok_or_else(ApiError::unauthorized)
}

/// Resolve the requesting user for a UI page. No session means a redirect
/// to the login page, carrying the original path in `next`.
pub fn ui_user(state: &AppState, headers: &HeaderMap, next: &str) -> Result<User, Redirect> {
    let redirect = || Redirect::to(&format!("/user/login?next={}", next));

    let token = session_token(headers).ok_or_else(redirect)?;
    match state.db.session_user(&token) {
        Ok(Some(user)) => Ok(user),
        _ => Err(redirect()),
    }
}

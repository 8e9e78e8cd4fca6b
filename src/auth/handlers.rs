use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::session;
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, SessionToken};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "folio_session";

// -- Request / response types --

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginUser {
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub success: bool,
    pub user: LoginUser,
    pub token: String,
}

// -- Cookie helpers --

fn session_cookie(token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

fn clear_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

// -- Handlers --

/// POST /api/auth/login: check the configured credentials and open a session
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Response> {
    if !state.credentials.verify(req.username.trim(), &req.password) {
        tracing::warn!("Failed login attempt for {:?}", req.username);
        return Err(AppError::Unauthorized);
    }

    let username = state.credentials.username.clone();
    let hours = state.config.auth.session_hours;
    let token = {
        let conn = state.db.get()?;
        session::create_session(&conn, &username, hours)?
    };
    tracing::info!("{} logged in", username);

    Ok((
        AppendHeaders([(header::SET_COOKIE, session_cookie(&token, hours))]),
        Json(LoginResponse {
            success: true,
            user: LoginUser { username },
            token,
        }),
    )
        .into_response())
}

/// POST /api/auth/logout: drop the caller's session, if any
pub async fn logout(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> AppResult<Response> {
    if let Some(token) = token {
        let conn = state.db.get()?;
        session::delete_session(&conn, &token)?;
    }

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::SET_COOKIE, clear_session_cookie())]),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_carries_max_age() {
        let cookie = session_cookie("abc", 2);
        assert!(cookie.starts_with("folio_session=abc;"));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }
}

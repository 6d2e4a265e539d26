//! Authentication route handlers.
//!
//! The access token travels in the response body; the refresh token lives in
//! an `HttpOnly` cookie scoped to `/auth`, so only refresh and logout see it.

use axum::{
    Json,
    extract::State,
    http::{
        HeaderMap, StatusCode,
        header::{COOKIE, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::middleware::RequestLanguage;
use crate::models::{LoginRequest, NewUser, RestoreComplete, RestoreRequest, RestoreVerify, User};
use crate::services::auth::recovery::RestorationStatus;
use crate::services::auth::tokens::REFRESH_TOKEN_TTL;
use crate::services::auth::upload::upload_token;
use crate::services::auth::{AuthError, AuthService, RecoveryService, TokenPayload, UploadToken};
use crate::state::AppState;

const REFRESH_COOKIE: &str = "refresh_token";
const REFRESH_COOKIE_PATH: &str = "/auth";

/// Body returned by login and refresh.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_token: Option<UploadToken>,
}

/// Issue both tokens for `user` and build the response with the cookie set.
fn signed_in(state: &AppState, user: User) -> Result<Response> {
    let pair = state
        .tokens()
        .issue(TokenPayload {
            id: user.id,
            is_admin: user.is_admin,
        })
        .map_err(AuthError::from)?;

    let upload_token = if user.is_admin {
        state.config().upload_secret.as_ref().map(upload_token)
    } else {
        None
    };

    let cookie = refresh_cookie(&pair.refresh, state.config().cookie_secure);
    let body = LoginResponse {
        access_token: pair.access,
        user,
        upload_token,
    };
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

fn refresh_cookie(token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{REFRESH_COOKIE}={token}; HttpOnly; Path={REFRESH_COOKIE_PATH}; Max-Age={}; SameSite=Lax",
        REFRESH_TOKEN_TTL.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cleared_cookie(secure: bool) -> String {
    let mut cookie =
        format!("{REFRESH_COOKIE}=; HttpOnly; Path={REFRESH_COOKIE_PATH}; Max-Age=0; SameSite=Lax");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Value of the refresh cookie, if the request carries one.
fn refresh_from_cookies(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == REFRESH_COOKIE && !value.is_empty())
        .map(|(_, value)| value)
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<NewUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool()).register(&request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    let user = AuthService::new(state.pool()).login(&request).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    signed_in(&state, user)
}

/// Rotate both tokens using the refresh cookie.
///
/// A refresh token whose account no longer exists also clears the cookie.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Result<Response> {
    let token = refresh_from_cookies(&headers)
        .ok_or_else(|| AppError::Unauthorized("missing refresh token".to_string()))?;
    let payload = state.tokens().verify_refresh(token).map_err(AuthError::from)?;

    match AuthService::new(state.pool()).get_user(payload.id).await {
        Ok(user) => signed_in(&state, user),
        Err(AuthError::UserNotFound) => {
            let cookie = cleared_cookie(state.config().cookie_secure);
            let error = AppError::Unauthorized("account no longer exists".to_string());
            Ok(([(SET_COOKIE, cookie)], error).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let cookie = cleared_cookie(state.config().cookie_secure);
    (StatusCode::NO_CONTENT, [(SET_COOKIE, cookie)])
}

/// Email a recovery code. Reports how many attempts the previous code used.
pub async fn restore(
    State(state): State<AppState>,
    RequestLanguage(lang): RequestLanguage,
    Json(request): Json<RestoreRequest>,
) -> Result<Json<RestorationStatus>> {
    let status = RecoveryService::new(state.pool(), state.email())
        .request(&request.email, lang)
        .await?;
    Ok(Json(status))
}

pub async fn restore_verify(
    State(state): State<AppState>,
    Json(request): Json<RestoreVerify>,
) -> Result<StatusCode> {
    RecoveryService::new(state.pool(), state.email())
        .verify(&request.email, &request.code)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_complete(
    State(state): State<AppState>,
    Json(request): Json<RestoreComplete>,
) -> Result<StatusCode> {
    RecoveryService::new(state.pool(), state.email())
        .complete(&request.email, &request.code, &request.password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("abc", true);
        assert!(cookie.starts_with("refresh_token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Path=/auth"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(cookie.ends_with("; Secure"));

        assert!(!refresh_cookie("abc", false).contains("Secure"));
        assert!(cleared_cookie(false).contains("Max-Age=0"));
    }

    #[test]
    fn test_refresh_from_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; refresh_token=abc.def"));
        assert_eq!(refresh_from_cookies(&headers), Some("abc.def"));

        headers.insert(COOKIE, HeaderValue::from_static("refresh_token="));
        assert_eq!(refresh_from_cookies(&headers), None);

        assert_eq!(refresh_from_cookies(&HeaderMap::new()), None);
    }

    #[test]
    fn test_multiple_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("refresh_token=xyz"));
        assert_eq!(refresh_from_cookies(&headers), Some("xyz"));
    }
}

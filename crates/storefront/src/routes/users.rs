//! Profile handlers.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use vitrina_core::{Email, PhoneNumber};

use crate::error::Result;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{User, UserPatch};
use crate::services::auth::AuthService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Email,
}

#[derive(Debug, Deserialize)]
pub struct PhoneQuery {
    pub phone: PhoneNumber,
}

#[derive(Debug, Serialize)]
pub struct Availability {
    pub available: bool,
}

pub async fn me(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
) -> Result<Json<User>> {
    Ok(Json(AuthService::new(state.pool()).get_user(caller.id).await?))
}

/// Change names, phone number or password.
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(caller): RequireAuth,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .update_profile(caller.id, &patch)
        .await?;
    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(Json(user))
}

/// Whether an email can be used. A signed-in caller's own address counts as
/// available, so profile forms can re-submit it.
pub async fn email_available(
    State(state): State<AppState>,
    OptionalAuth(caller): OptionalAuth,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Availability>> {
    let auth = AuthService::new(state.pool());
    if let Some(caller) = caller
        && auth.get_user(caller.id).await.is_ok_and(|user| user.email == query.email)
    {
        return Ok(Json(Availability { available: true }));
    }
    let available = auth.email_available(&query.email).await?;
    Ok(Json(Availability { available }))
}

pub async fn phone_available(
    State(state): State<AppState>,
    OptionalAuth(caller): OptionalAuth,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<Availability>> {
    let auth = AuthService::new(state.pool());
    if let Some(caller) = caller
        && auth
            .get_user(caller.id)
            .await
            .is_ok_and(|user| user.phone_number == query.phone)
    {
        return Ok(Json(Availability { available: true }));
    }
    let available = auth.phone_available(&query.phone).await?;
    Ok(Json(Availability { available }))
}

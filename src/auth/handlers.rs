use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{LoginRequest, RefreshRequest},
    extractors::AuthUser,
    jwt::{JwtKeys, TokenPair},
    password::verify_password,
};
use crate::{
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
    users::{dto::PublicUser, dto::RegisterRequest, services},
};

const BAD_CREDENTIALS: &str = "No active account found with the given credentials";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/token/", post(obtain_token))
        .route("/token/refresh/", post(refresh_token))
        .route("/register/", post(register))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me/", get(get_me))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn obtain_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<TokenPair>> {
    let Some(user) = state
        .store
        .find_user_by_username(payload.username.trim())
        .await?
    else {
        warn!("login unknown username");
        return Err(ApiError::unauthenticated(BAD_CREDENTIALS));
    };

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::unauthenticated(BAD_CREDENTIALS));
    }

    let pair = JwtKeys::from_ref(&state).issue_pair(&user)?;
    info!(user_id = %user.id, role = %user.role, "user logged in");
    Ok(Json(pair))
}

/// Reloads the user so the new pair reflects its current username and role.
#[instrument(skip(state, payload))]
pub async fn refresh_token(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RefreshRequest>,
) -> ApiResult<Json<TokenPair>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        ApiError::unauthenticated("Token is invalid or expired")
    })?;

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("User not found"))?;

    Ok(Json(keys.issue_pair(&user)?))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    let user = services::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[instrument(skip(state, caller), fields(user_id = %caller.id))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<PublicUser>> {
    let user = state
        .store
        .find_user(caller.id)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("User not found"))?;
    Ok(Json(user.into()))
}

//! Auth handlers

use crate::auth::UserInfo;
use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use crate::response::AppResponse;
use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: String,
    pub username: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<AppResponse<AuthResponse>>> {
    info!("POST /auth/register - {}", req.email);

    // Registration issues a session directly; no second login round-trip
    let (user, session) = state
        .auth
        .register(req.email.clone(), req.username, req.password)
        .await
        .map_err(|e| {
            warn!("Registration failed for {}: {}", req.email, e);
            Error::BadRequest(e.to_string())
        })?;

    Ok(Json(AppResponse::ok(AuthResponse {
        token: session.token,
        user_id: user.id,
        username: user.username,
        expires_at: session.expires_at,
    })))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AppResponse<AuthResponse>>> {
    info!("POST /auth/login - {}", req.email);

    match state.auth.login(req.email.clone(), req.password).await {
        Ok((user, session)) => Ok(Json(AppResponse::ok(AuthResponse {
            token: session.token,
            user_id: user.id,
            username: user.username,
            expires_at: session.expires_at,
        }))),
        Err(e) => {
            warn!("Login failed for {}: {}", req.email, e);
            Err(Error::LoginFail)
        }
    }
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AppResponse<()>>> {
    info!("POST /auth/logout");

    let token = bearer_token(&headers).ok_or(Error::AuthFailNoToken)?;

    state
        .auth
        .logout(&token)
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?;

    Ok(Json(AppResponse::ok(())))
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<AppResponse<UserInfo>>> {
    let user = state.auth.get_user(ctx.user_id()).await?;

    Ok(Json(AppResponse::ok(user)))
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<AppResponse<Vec<UserInfo>>>> {
    let users = state.auth.list_users().await?;
    Ok(Json(AppResponse::ok(users)))
}

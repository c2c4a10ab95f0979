//! Quick message handlers

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use crate::quick::QuickMessage;
use crate::response::AppResponse;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CreateQuickMessageRequest {
    pub key: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuickMessageRequest {
    pub text: String,
}

/// POST /quick-messages
pub async fn create(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<CreateQuickMessageRequest>,
) -> Result<Json<AppResponse<QuickMessage>>> {
    info!("POST /quick-messages - '{}'", req.key);

    let quick = state
        .quick
        .create(ctx.user_id(), req.key, req.text)
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?;

    Ok(Json(AppResponse::ok(quick)))
}

/// GET /quick-messages
pub async fn list(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<AppResponse<Vec<QuickMessage>>>> {
    let quick = state.quick.list(ctx.user_id()).await?;
    Ok(Json(AppResponse::ok(quick)))
}

/// PUT /quick-messages/{key}
pub async fn update(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(key): Path<String>,
    Json(req): Json<UpdateQuickMessageRequest>,
) -> Result<Json<AppResponse<()>>> {
    info!("PUT /quick-messages/{}", key);

    state
        .quick
        .update(ctx.user_id(), &key, req.text)
        .await
        .map_err(|e| Error::NotFound(e.to_string()))?;

    Ok(Json(AppResponse::ok(())))
}

/// DELETE /quick-messages/{key}
pub async fn delete(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(key): Path<String>,
) -> Result<Json<AppResponse<()>>> {
    info!("DELETE /quick-messages/{}", key);

    state
        .quick
        .delete(ctx.user_id(), &key)
        .await
        .map_err(|e| Error::NotFound(e.to_string()))?;

    Ok(Json(AppResponse::ok(())))
}

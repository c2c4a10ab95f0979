//! Message handlers

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use crate::messages::dispatch::DispatchError;
use crate::messages::{ConversationSummary, Message};
use crate::response::AppResponse;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub receiver_id: Option<String>,
    pub conversation_id: Option<String>,
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub conversation_id: Option<String>,
    pub group_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub marked: u64,
}

/// POST /messages
pub async fn send_message(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<AppResponse<Message>>> {
    info!("POST /messages - from {}", ctx.username());

    match state
        .messages
        .send_message(
            ctx.user_id().to_string(),
            req.content,
            req.receiver_id,
            req.conversation_id,
            req.group_id,
        )
        .await
    {
        Ok(message) => Ok(Json(AppResponse::ok(message))),
        Err(e) => {
            warn!("Send failed for {}: {}", ctx.user_id(), e);
            // Dispatch failures carry their own status mapping
            match e.downcast::<DispatchError>() {
                Ok(dispatch_err) => Err(dispatch_err.into()),
                Err(other) => Err(Error::BadRequest(other.to_string())),
            }
        }
    }
}

/// POST /messages/read
pub async fn mark_read(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<MarkReadRequest>,
) -> Result<Json<AppResponse<MarkReadResponse>>> {
    info!("POST /messages/read - {}", ctx.user_id());

    let marked = state
        .messages
        .mark_read(
            ctx.user_id(),
            req.conversation_id.as_deref(),
            req.group_id.as_deref(),
        )
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?;

    Ok(Json(AppResponse::ok(MarkReadResponse { marked })))
}

/// GET /conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<AppResponse<Vec<ConversationSummary>>>> {
    let conversations = state.messages.list_conversations(ctx.user_id()).await?;
    Ok(Json(AppResponse::ok(conversations)))
}

/// GET /conversations/{conversation_id}/messages
pub async fn conversation_messages(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(conversation_id): Path<String>,
) -> Result<Json<AppResponse<Vec<Message>>>> {
    let messages = state
        .messages
        .conversation_messages(&conversation_id, ctx.user_id())
        .await
        .map_err(|e| Error::Forbidden(e.to_string()))?;

    Ok(Json(AppResponse::ok(messages)))
}

/// GET /groups/{group_id}/messages
pub async fn group_messages(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(group_id): Path<String>,
) -> Result<Json<AppResponse<Vec<Message>>>> {
    let messages = state
        .messages
        .group_messages(&group_id, ctx.user_id())
        .await
        .map_err(|e| Error::Forbidden(e.to_string()))?;

    Ok(Json(AppResponse::ok(messages)))
}

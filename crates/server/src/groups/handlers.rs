//! Group & invite handlers

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use crate::groups::{Group, GroupInvite, GroupMember, GroupMemberInfo};
use crate::response::AppResponse;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinGroupRequest {
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
pub struct PromoteRequest {
    pub user_id: String,
}

/// POST /groups
pub async fn create_group(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<CreateGroupRequest>,
) -> Result<Json<AppResponse<Group>>> {
    info!("POST /groups - '{}' by {}", req.name, ctx.username());

    let group = state
        .groups
        .create_group(req.name, ctx.user_id().to_string())
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?;

    Ok(Json(AppResponse::ok(group)))
}

/// GET /groups
pub async fn list_groups(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<AppResponse<Vec<Group>>>> {
    let groups = state.groups.list_user_groups(ctx.user_id()).await?;
    Ok(Json(AppResponse::ok(groups)))
}

/// POST /groups/{group_id}/invite
pub async fn generate_invite(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(group_id): Path<String>,
) -> Result<Json<AppResponse<GroupInvite>>> {
    info!("POST /groups/{}/invite", group_id);

    match state.groups.generate_invite(&group_id, ctx.user_id()).await {
        Ok(invite) => Ok(Json(AppResponse::ok(invite))),
        Err(e) => {
            warn!("Invite generation failed for {}: {}", group_id, e);
            Err(Error::Forbidden(e.to_string()))
        }
    }
}

/// DELETE /groups/{group_id}/invite
pub async fn revoke_invite(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(group_id): Path<String>,
) -> Result<Json<AppResponse<()>>> {
    info!("DELETE /groups/{}/invite", group_id);

    state
        .groups
        .revoke_invite(&group_id, ctx.user_id())
        .await
        .map_err(|e| Error::Forbidden(e.to_string()))?;

    Ok(Json(AppResponse::ok(())))
}

/// POST /groups/join
pub async fn join_group(
    State(state): State<AppState>,
    ctx: Ctx,
    Json(req): Json<JoinGroupRequest>,
) -> Result<Json<AppResponse<GroupMember>>> {
    info!("POST /groups/join");

    match state
        .groups
        .join_with_code(&req.invite_code, ctx.user_id())
        .await
    {
        Ok(member) => Ok(Json(AppResponse::ok(member))),
        Err(e) => {
            warn!("Join failed for {}: {}", ctx.user_id(), e);
            Err(Error::BadRequest(e.to_string()))
        }
    }
}

/// POST /groups/{group_id}/leave
pub async fn leave_group(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(group_id): Path<String>,
) -> Result<Json<AppResponse<()>>> {
    info!("POST /groups/{}/leave", group_id);

    state
        .groups
        .leave_group(&group_id, ctx.user_id())
        .await
        .map_err(|e| Error::BadRequest(e.to_string()))?;

    Ok(Json(AppResponse::ok(())))
}

/// POST /groups/{group_id}/promote
pub async fn promote_member(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(group_id): Path<String>,
    Json(req): Json<PromoteRequest>,
) -> Result<Json<AppResponse<()>>> {
    info!("POST /groups/{}/promote - {}", group_id, req.user_id);

    state
        .groups
        .promote_member(&group_id, ctx.user_id(), &req.user_id)
        .await
        .map_err(|e| Error::Forbidden(e.to_string()))?;

    Ok(Json(AppResponse::ok(())))
}

/// GET /groups/{group_id}/members
pub async fn list_members(
    State(state): State<AppState>,
    ctx: Ctx,
    Path(group_id): Path<String>,
) -> Result<Json<AppResponse<Vec<GroupMemberInfo>>>> {
    let members = state
        .groups
        .list_members(&group_id, ctx.user_id())
        .await
        .map_err(|e| Error::Forbidden(e.to_string()))?;

    Ok(Json(AppResponse::ok(members)))
}

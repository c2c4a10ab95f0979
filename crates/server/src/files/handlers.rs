//! File upload handlers

use crate::config::AppState;
use crate::ctx::Ctx;
use crate::error::{Error, Result};
use crate::files::FileRecord;
use crate::response::AppResponse;
use axum::{
    extract::{Multipart, Path, State},
    http::HeaderMap,
    Json,
};
use tracing::{error, info};

/// POST /files
pub async fn upload_file(
    State(state): State<AppState>,
    ctx: Ctx,
    mut multipart: Multipart,
) -> Result<Json<AppResponse<FileRecord>>> {
    info!("POST /files - from {}", ctx.user_id());

    let mut filename = None;
    let mut content_type = None;
    let mut data = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {}", e);
        Error::BadRequest("Malformed multipart body".to_string())
    })? {
        let name = field.name().unwrap_or("").to_string();

        if name == "file" {
            filename = field.file_name().map(|s| s.to_string());
            content_type = field.content_type().map(|s| s.to_string());
            data = Some(field.bytes().await.map_err(|e| {
                error!("Failed to read file data: {}", e);
                Error::BadRequest("Failed to read file data".to_string())
            })?);
        }
    }

    let data = data.ok_or_else(|| Error::BadRequest("Missing 'file' field".to_string()))?;
    let filename = filename.unwrap_or_else(|| "unnamed".to_string());
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    if data.len() > state.config.max_upload_size * 1024 * 1024 {
        return Err(Error::BadRequest(format!(
            "Upload exceeds {} MB limit",
            state.config.max_upload_size
        )));
    }

    let record = state
        .files
        .store_file(ctx.user_id(), filename, content_type, data)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?;

    Ok(Json(AppResponse::ok(record)))
}

/// GET /files/{file_id}
pub async fn download_file(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<(HeaderMap, axum::body::Bytes)> {
    info!("GET /files/{}", file_id);

    let (record, data) = state
        .files
        .get_file(&file_id)
        .await
        .map_err(|e| Error::NotFound(e.to_string()))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        record
            .content_type
            .parse()
            .map_err(|_| Error::Internal("Invalid stored content type".to_string()))?,
    );

    Ok((headers, data))
}

/// GET /files
pub async fn list_files(
    State(state): State<AppState>,
    ctx: Ctx,
) -> Result<Json<AppResponse<Vec<FileRecord>>>> {
    let files = state.files.list_user_files(ctx.user_id()).await?;
    Ok(Json(AppResponse::ok(files)))
}

use crate::{
    error::{AppError, Result},
    models::media::{BulkDeleteRequest, MediaListQuery, MediaUploadResponse, UpdateMediaRequest, UploadMediaOptions},
    require_permission,
    services::auth::User,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};
use validator::Validate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload", post(upload_media))
        .route("/bulk-delete", post(bulk_delete_media))
        .route("/stats/storage", get(storage_stats))
        .route("/stats/folders", get(folder_stats))
        .route("/health/usage", get(usage_health))
        .route("/files/*path", get(serve_file))
        .route("/", get(list_media))
        .route("/:media_id", get(get_media).patch(update_media).delete(delete_media))
        .route("/:media_id/restore", post(restore_media))
}

/// 上传媒体文件
/// POST /api/cms/media/upload
pub async fn upload_media(
    State(app_state): State<Arc<AppState>>,
    user: User,
    mut multipart: Multipart,
) -> Result<Json<MediaUploadResponse>> {
    require_permission!(app_state.auth_service, user, "media.upload");

    debug!("Processing media upload for user: {}", user.id);

    let mut file_data: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut content_type: Option<String> = None;
    let mut options = UploadMediaOptions::default();

    // 处理multipart表单数据
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to process multipart field: {}", e);
        AppError::BadRequest("无法处理上传的文件".to_string())
    })? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                content_type = field.content_type().map(|s| s.to_string());

                let data = field.bytes().await.map_err(|e| {
                    error!("Failed to read file data: {}", e);
                    AppError::BadRequest("无法读取文件数据".to_string())
                })?;
                file_data = Some(data.to_vec());
            }
            "folder" => {
                options.folder = Some(read_text_field(field).await?);
            }
            "alt_text" => {
                options.alt_text = Some(read_text_field(field).await?);
            }
            "caption" => {
                options.caption = Some(read_text_field(field).await?);
            }
            _ => {}
        }
    }

    let file_data = file_data.ok_or_else(|| AppError::BadRequest("未找到上传的文件".to_string()))?;
    let filename = filename.unwrap_or_else(|| "unnamed".to_string());
    let content_type = content_type.unwrap_or_else(|| "application/octet-stream".to_string());

    debug!(
        "Uploading file: {} ({}), size: {} bytes",
        filename,
        content_type,
        file_data.len()
    );

    let upload_result = app_state
        .media_service
        .upload(&user.id, &filename, &content_type, file_data, options)
        .await?;

    info!(
        "Successfully uploaded media for user: {}, filename: {}",
        user.id, filename
    );

    Ok(Json(upload_result))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::BadRequest(format!("无法读取表单字段: {}", e)))
}

/// 媒体文件列表
/// GET /api/cms/media/
pub async fn list_media(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<MediaListQuery>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.read");

    let result = app_state.media_service.list(&query).await?;

    Ok(Json(json!({
        "success": true,
        "data": result,
    })))
}

/// 单个媒体详情（含引用方）
/// GET /api/cms/media/:media_id
pub async fn get_media(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Path(media_id): Path<String>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.read");

    let detail = app_state.media_service.get_detail(&media_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": detail,
    })))
}

/// 更新媒体元数据
/// PATCH /api/cms/media/:media_id
pub async fn update_media(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Path(media_id): Path<String>,
    Json(request): Json<UpdateMediaRequest>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.update");

    request.validate().map_err(AppError::ValidatorError)?;

    let updated = app_state
        .media_service
        .update_metadata(&media_id, &request)
        .await?;

    info!("Updated media metadata: {} by user: {}", media_id, user.id);

    Ok(Json(json!({
        "success": true,
        "data": updated.to_response(),
    })))
}

/// 删除媒体文件（仍被引用时拒绝）
/// DELETE /api/cms/media/:media_id
pub async fn delete_media(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Path(media_id): Path<String>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.delete");

    app_state.media_service.delete(&media_id).await?;

    info!("Deleted media: {} by user: {}", media_id, user.id);

    Ok(Json(json!({
        "success": true,
        "message": "媒体文件已删除"
    })))
}

/// 批量删除
/// POST /api/cms/media/bulk-delete
pub async fn bulk_delete_media(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<BulkDeleteRequest>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.delete");

    request.validate().map_err(AppError::ValidatorError)?;

    let deleted = app_state.media_service.bulk_delete(&request.ids).await?;

    info!(
        "Bulk deleted {} media files by user: {}",
        deleted.len(),
        user.id
    );

    Ok(Json(json!({
        "success": true,
        "data": {
            "deleted": deleted,
        }
    })))
}

/// 恢复软删除的媒体记录
/// POST /api/cms/media/:media_id/restore
pub async fn restore_media(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Path(media_id): Path<String>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.manage");

    let restored = app_state.media_service.restore(&media_id).await?;

    info!("Restored media: {} by user: {}", media_id, user.id);

    Ok(Json(json!({
        "success": true,
        "data": restored.to_response(),
    })))
}

/// 存储占用统计
/// GET /api/cms/media/stats/storage
pub async fn storage_stats(
    State(app_state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.read");

    let stats = app_state.media_service.storage_stats().await?;

    Ok(Json(json!({
        "success": true,
        "data": stats,
    })))
}

/// 按目录统计
/// GET /api/cms/media/stats/folders
pub async fn folder_stats(
    State(app_state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.read");

    let stats = app_state.media_service.folder_stats().await?;

    Ok(Json(json!({
        "success": true,
        "data": stats,
    })))
}

/// 引用图健康检查（按需扫描，无后台任务）
/// GET /api/cms/media/health/usage
pub async fn usage_health(
    State(app_state): State<Arc<AppState>>,
    user: User,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "media.manage");

    let report = app_state.usage_tracker.usage_health_report().await?;

    Ok(Json(json!({
        "success": true,
        "data": report,
    })))
}

/// 获取文件内容
/// GET /api/cms/media/files/*path
pub async fn serve_file(
    State(app_state): State<Arc<AppState>>,
    Path(file_path): Path<String>,
) -> Result<Response<Body>> {
    debug!("Serving file: {}", file_path);

    let file_data = app_state.media_service.get_file(&file_path).await?;

    let content_type = determine_content_type(&file_path);

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "public, max-age=31536000") // 缓存一年
        .body(Body::from(file_data))
        .map_err(|e| {
            error!("Failed to build file response: {}", e);
            AppError::Internal("构建文件响应失败".to_string())
        })?;

    Ok(response)
}

fn determine_content_type(file_path: &str) -> &'static str {
    let extension = file_path.rsplit('.').next().unwrap_or("").to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

use crate::{
    error::{AppError, Result},
    models::post::{CreatePostRequest, PostQuery, UpdatePostRequest},
    require_permission,
    services::auth::User,
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(create_post).get(list_posts))
        .route("/:post_id", get(get_post).put(update_post).delete(delete_post))
}

/// 创建文章
/// POST /api/cms/posts/
pub async fn create_post(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Json(request): Json<CreatePostRequest>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "post.create");

    debug!("Creating post for user: {}", user.id);

    let post = app_state.post_service.create_post(&user.id, request).await?;

    Ok(Json(json!({
        "success": true,
        "data": post.to_response(),
    })))
}

/// 文章列表
/// GET /api/cms/posts/
pub async fn list_posts(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Query(query): Query<PostQuery>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "post.read");

    let result = app_state.post_service.list_posts(&query).await?;

    Ok(Json(json!({
        "success": true,
        "data": result,
    })))
}

/// 文章详情
/// GET /api/cms/posts/:post_id
pub async fn get_post(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "post.read");

    let post = app_state.post_service.get_post(&post_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": post.to_response(),
    })))
}

/// 更新文章
/// PUT /api/cms/posts/:post_id
pub async fn update_post(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
    Json(request): Json<UpdatePostRequest>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "post.update");

    let post = app_state
        .post_service
        .update_post(&post_id, &user.id, request)
        .await?;

    info!("Updated post: {} by user: {}", post_id, user.id);

    Ok(Json(json!({
        "success": true,
        "data": post.to_response(),
    })))
}

/// 删除文章
/// DELETE /api/cms/posts/:post_id
pub async fn delete_post(
    State(app_state): State<Arc<AppState>>,
    user: User,
    Path(post_id): Path<String>,
) -> Result<Json<Value>> {
    require_permission!(app_state.auth_service, user, "post.delete");

    app_state.post_service.delete_post(&post_id, &user.id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "文章已删除"
    })))
}

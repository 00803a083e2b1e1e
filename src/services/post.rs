use crate::{
    error::{AppError, Result},
    models::post::*,
    models::response::PaginatedResponse,
    services::{Database, UsageTrackerService},
    utils::sanitize,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

const POST_TABLE: &str = "post";

/// 文章服务
///
/// 文章是媒体引用的持有方：正文内嵌图与封面图的变化通过使用跟踪
/// 服务同步到媒体注册表。引用登记失败不会回滚文章写入。
#[derive(Clone)]
pub struct PostService {
    db: Arc<Database>,
    tracker: UsageTrackerService,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

impl PostService {
    pub async fn new(db: Arc<Database>, tracker: UsageTrackerService) -> Result<Self> {
        Ok(Self { db, tracker })
    }

    /// 创建文章
    pub async fn create_post(&self, author_id: &str, request: CreatePostRequest) -> Result<Post> {
        debug!("Creating post for user: {}", author_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let mut post = Post::new(
            request.title,
            sanitize::sanitize_html(&request.content),
            author_id.to_string(),
        );
        post.excerpt = request.excerpt;
        post.featured_image_id = request.featured_image_id;

        if !request.save_as_draft.unwrap_or(true) {
            post.publish();
        }

        let post_id = post.id.clone();
        let created = self.db.create_with_id(POST_TABLE, &post_id, post).await?;

        // 登记媒体引用，尽力而为
        self.tracker
            .on_owner_created(
                POST_TABLE,
                &created.id,
                &created.content,
                created.featured_image_id.as_deref(),
            )
            .await;

        info!("Created post: {} by user: {}", created.id, author_id);
        Ok(created)
    }

    /// 更新文章，并按新旧内容差异调整媒体引用
    pub async fn update_post(
        &self,
        post_id: &str,
        author_id: &str,
        request: UpdatePostRequest,
    ) -> Result<Post> {
        debug!("Updating post: {} by user: {}", post_id, author_id);

        request.validate().map_err(AppError::ValidatorError)?;

        let mut post = self.get_post(post_id).await?;

        if post.author_id != author_id {
            return Err(AppError::Authorization(
                "Only post author can update this post".to_string(),
            ));
        }

        let old_content = post.content.clone();
        let old_featured = post.featured_image_id.clone();

        if let Some(title) = request.title {
            if title != post.title {
                post.slug = crate::utils::slug::generate_slug(&title);
                post.title = title;
            }
        }
        if let Some(content) = request.content {
            post.content = sanitize::sanitize_html(&content);
        }
        if let Some(excerpt) = request.excerpt {
            post.excerpt = Some(excerpt);
        }
        if request.clear_featured_image.unwrap_or(false) {
            post.featured_image_id = None;
        } else if let Some(featured_image_id) = request.featured_image_id {
            post.featured_image_id = Some(featured_image_id);
        }
        if let Some(status) = request.status {
            if post.status != PostStatus::Published && status == PostStatus::Published {
                post.published_at = Some(Utc::now());
            }
            post.status = status;
        }
        post.updated_at = Utc::now();

        let updated = self
            .db
            .update_by_id(POST_TABLE, post_id, post)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        self.tracker
            .on_owner_updated(
                POST_TABLE,
                &updated.id,
                &old_content,
                &updated.content,
                old_featured.as_deref(),
                updated.featured_image_id.as_deref(),
            )
            .await;

        info!("Updated post: {}", post_id);
        Ok(updated)
    }

    /// 软删除文章并移除其全部媒体引用
    pub async fn delete_post(&self, post_id: &str, author_id: &str) -> Result<()> {
        debug!("Deleting post: {} by user: {}", post_id, author_id);

        let post = self.get_post(post_id).await?;

        if post.author_id != author_id {
            return Err(AppError::Authorization(
                "Only post author can delete this post".to_string(),
            ));
        }

        self.db
            .query_with_params(
                "UPDATE type::thing('post', $id) \
                 SET is_deleted = true, deleted_at = time::now(), updated_at = time::now()",
                json!({ "id": post_id }),
            )
            .await?;

        self.tracker
            .on_owner_deleted(
                POST_TABLE,
                &post.id,
                &post.content,
                post.featured_image_id.as_deref(),
            )
            .await;

        info!("Deleted post: {}", post_id);
        Ok(())
    }

    /// 根据 ID 获取未删除的文章
    pub async fn get_post(&self, post_id: &str) -> Result<Post> {
        let post: Option<Post> = self.db.get_by_id(POST_TABLE, post_id).await?;

        match post {
            Some(post) if !post.is_deleted => Ok(post),
            _ => Err(AppError::not_found("Post")),
        }
    }

    /// 分页列表
    pub async fn list_posts(&self, query: &PostQuery) -> Result<PaginatedResponse<PostResponse>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(self.db.config.default_page_size)
            .clamp(1, self.db.config.max_page_size);
        let start = (page - 1) * limit;

        let mut conditions = vec!["is_deleted = false"];
        if query.status.is_some() {
            conditions.push("status = $status");
        }
        if query.author.is_some() {
            conditions.push("author_id = $author");
        }
        if query.search.is_some() {
            conditions.push("string::contains(string::lowercase(title), $search)");
        }
        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let params = json!({
            "status": query.status,
            "author": query.author,
            "search": query.search.as_deref().map(|s| s.to_lowercase()),
            "limit": limit,
            "start": start,
        });

        let sql = format!(
            "SELECT * FROM post {} ORDER BY created_at DESC LIMIT $limit START $start",
            where_clause
        );
        let mut response = self.db.query_with_params(&sql, &params).await?;
        let posts: Vec<Post> = response.take(0)?;

        let count_sql = format!("SELECT count() AS count FROM post {} GROUP ALL", where_clause);
        let mut count_response = self.db.query_with_params(&count_sql, &params).await?;
        let counts: Vec<CountRow> = count_response.take(0)?;
        let total = counts.first().map(|r| r.count).unwrap_or(0);

        let items = posts.iter().map(Post::to_response).collect();
        Ok(PaginatedResponse::new(items, page, limit, total))
    }
}

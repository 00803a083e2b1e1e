use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    pub id: String,
    pub title: String,
    pub slug: String,
    /// 已净化的富文本HTML内容
    pub content: String,
    pub excerpt: Option<String>,
    /// 封面图引用的媒体文件ID
    pub featured_image_id: Option<String>,
    pub author_id: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
}

impl Default for PostStatus {
    fn default() -> Self {
        Self::Draft
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: String,

    #[validate(length(max = 100000))]
    pub content: String,

    #[validate(length(max = 300))]
    pub excerpt: Option<String>,

    pub featured_image_id: Option<String>,
    pub save_as_draft: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 150))]
    pub title: Option<String>,

    #[validate(length(max = 100000))]
    pub content: Option<String>,

    #[validate(length(max = 300))]
    pub excerpt: Option<String>,

    /// Some(None) 即显式清除封面图时，请求中传 null 无法与缺省区分，
    /// 因此用单独的布尔开关表达清除
    pub featured_image_id: Option<String>,
    pub clear_featured_image: Option<bool>,
    pub status: Option<PostStatus>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct PostQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub author: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub featured_image_id: Option<String>,
    pub author_id: String,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn new(title: String, content: String, author_id: String) -> Self {
        let now = Utc::now();
        let slug = crate::utils::slug::generate_slug(&title);

        Self {
            id: Uuid::new_v4().to_string(),
            title,
            slug,
            content,
            excerpt: None,
            featured_image_id: None,
            author_id,
            status: PostStatus::Draft,
            created_at: now,
            updated_at: now,
            published_at: None,
            is_deleted: false,
            deleted_at: None,
        }
    }

    pub fn publish(&mut self) {
        if self.status == PostStatus::Draft {
            self.status = PostStatus::Published;
            self.published_at = Some(Utc::now());
            self.updated_at = Utc::now();
        }
    }

    pub fn to_response(&self) -> PostResponse {
        PostResponse {
            id: self.id.clone(),
            title: self.title.clone(),
            slug: self.slug.clone(),
            content: self.content.clone(),
            excerpt: self.excerpt.clone(),
            featured_image_id: self.featured_image_id.clone(),
            author_id: self.author_id.clone(),
            status: self.status.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            published_at: self.published_at,
        }
    }
}

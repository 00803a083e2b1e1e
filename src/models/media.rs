use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 媒体分类，由MIME类型推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCategory {
    Image,
    Document,
    Video,
    Audio,
    Other,
}

impl MediaCategory {
    pub fn from_mime_type(mime_type: &str) -> Self {
        if mime_type.starts_with("image/") {
            Self::Image
        } else if mime_type.starts_with("video/") {
            Self::Video
        } else if mime_type.starts_with("audio/") {
            Self::Audio
        } else if mime_type == "application/pdf"
            || mime_type.starts_with("text/")
            || mime_type.contains("document")
        {
            Self::Document
        } else {
            Self::Other
        }
    }
}

/// 一条使用引用：某个内容实体（如文章）引用了该媒体文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRef {
    /// 引用方的模型名称，例如 "post"
    pub model: String,
    /// 引用方的记录ID
    pub ref_id: String,
}

/// 媒体文件记录
///
/// `usage_count` 始终等于 `used_in.len()`，由使用跟踪的原子更新维护，
/// 其他代码不得直接修改这两个字段。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    #[serde(with = "crate::utils::serde_helpers::thing_id")]
    pub id: String,
    /// 生成的唯一文件名（随机标识 + 时间戳）
    pub filename: String,
    /// 用户上传时的原始文件名
    pub original_filename: String,
    pub content_type: String,
    pub size: i64,
    pub category: MediaCategory,
    /// 所属目录（已净化的路径段）
    pub folder: String,
    /// 对象存储中的键
    pub storage_path: String,
    pub public_url: String,
    pub thumbnail_url: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    // 图片专属元数据
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub is_optimized: bool,
    // 使用状态
    pub used_in: Vec<UsageRef>,
    pub usage_count: i64,
    // 生命周期
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MediaAsset {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn is_in_use(&self) -> bool {
        !self.used_in.is_empty()
    }

    /// 缩略图在对象存储中的键：`<folder>/thumbnails/<filename>`
    pub fn thumbnail_key(&self) -> String {
        format!("{}/thumbnails/{}", self.folder, self.filename)
    }

    pub fn to_response(&self) -> MediaResponse {
        MediaResponse {
            id: self.id.clone(),
            filename: self.filename.clone(),
            original_filename: self.original_filename.clone(),
            content_type: self.content_type.clone(),
            size: self.size,
            category: self.category,
            folder: self.folder.clone(),
            url: self.public_url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            alt_text: self.alt_text.clone(),
            caption: self.caption.clone(),
            width: self.width,
            height: self.height,
            format: self.format.clone(),
            is_optimized: self.is_optimized,
            usage_count: self.usage_count,
            uploaded_by: self.uploaded_by.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
        }
    }
}

/// 上传接口返回的公开元数据
#[derive(Debug, Serialize, Deserialize)]
pub struct MediaUploadResponse {
    pub id: String,
    pub filename: String,
    pub original_filename: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub content_type: String,
    pub size: i64,
    pub category: MediaCategory,
    pub folder: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub is_optimized: bool,
    pub original_size: i64,
    pub optimized_size: i64,
    pub compression_ratio: f64,
}

/// 列表与详情接口返回的媒体信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaResponse {
    pub id: String,
    pub filename: String,
    pub original_filename: String,
    pub content_type: String,
    pub size: i64,
    pub category: MediaCategory,
    pub folder: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: Option<String>,
    pub is_optimized: bool,
    pub usage_count: i64,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// 引用该媒体的内容实体信息（详情接口返回）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageTargetInfo {
    pub model: String,
    pub ref_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MediaDetailResponse {
    #[serde(flatten)]
    pub media: MediaResponse,
    pub used_in: Vec<UsageTargetInfo>,
}

/// 上传时随文件提交的元数据
#[derive(Debug, Default, Deserialize)]
pub struct UploadMediaOptions {
    pub folder: Option<String>,
    pub alt_text: Option<String>,
    pub caption: Option<String>,
}

/// 媒体元数据更新请求
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMediaRequest {
    #[validate(length(max = 500))]
    pub alt_text: Option<String>,

    #[validate(length(max = 1000))]
    pub caption: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub folder: Option<String>,
}

/// 批量删除请求
#[derive(Debug, Deserialize, Validate)]
pub struct BulkDeleteRequest {
    #[validate(length(min = 1, max = 100))]
    pub ids: Vec<String>,
}

/// 软删除过滤方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletedFilter {
    /// 默认：排除已软删除的记录
    #[default]
    Exclude,
    /// 只返回已软删除的记录
    Only,
    /// 返回全部记录
    All,
}

impl DeletedFilter {
    pub fn from_query(value: Option<&str>) -> Self {
        match value {
            Some("only") => Self::Only,
            Some("all") => Self::All,
            _ => Self::Exclude,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct MediaListQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub folder: Option<String>,
    /// MIME类型前缀过滤，例如 "image" 或 "image/png"
    #[serde(rename = "type")]
    pub content_type: Option<String>,
    /// 在原始文件名、替代文本、说明文字中搜索
    pub search: Option<String>,
    /// "only" | "all"，缺省排除已删除
    pub deleted: Option<String>,
    pub sort: Option<String>,
}

/// 单个媒体文件的引用漂移情况（健康检查输出）
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageDriftEntry {
    pub media_id: String,
    pub filename: String,
    /// 内容实际引用但注册表缺失的引用方
    pub missing: Vec<String>,
    /// 注册表存在但内容已不再引用的引用方
    pub stale: Vec<String>,
}

/// 引用图健康检查报告。
/// 跟踪失败只记录日志不阻断主实体写入，这里按需全量比对以发现漂移。
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageHealthReport {
    pub checked_assets: usize,
    pub checked_owners: usize,
    pub drifted: Vec<UsageDriftEntry>,
    /// 引用计数与引用列表长度不一致的记录
    pub counter_mismatches: Vec<String>,
    /// 没有任何引用的媒体文件，可安全清理
    pub orphans: Vec<String>,
}

/// 按分类统计的存储占用
#[derive(Debug, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_files: i64,
    pub total_size: i64,
    pub images_count: i64,
    pub images_size: i64,
    pub documents_count: i64,
    pub documents_size: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FolderStats {
    pub folder: String,
    pub count: i64,
    pub total_size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_mime_type() {
        assert_eq!(MediaCategory::from_mime_type("image/jpeg"), MediaCategory::Image);
        assert_eq!(MediaCategory::from_mime_type("image/png"), MediaCategory::Image);
        assert_eq!(MediaCategory::from_mime_type("application/pdf"), MediaCategory::Document);
        assert_eq!(MediaCategory::from_mime_type("video/mp4"), MediaCategory::Video);
        assert_eq!(MediaCategory::from_mime_type("audio/mpeg"), MediaCategory::Audio);
        assert_eq!(MediaCategory::from_mime_type("application/zip"), MediaCategory::Other);
    }

    #[test]
    fn test_thumbnail_key() {
        let asset = sample_asset();
        assert_eq!(asset.thumbnail_key(), "articles/thumbnails/abc-123.jpg");
    }

    #[test]
    fn test_deleted_filter_from_query() {
        assert_eq!(DeletedFilter::from_query(None), DeletedFilter::Exclude);
        assert_eq!(DeletedFilter::from_query(Some("only")), DeletedFilter::Only);
        assert_eq!(DeletedFilter::from_query(Some("all")), DeletedFilter::All);
        assert_eq!(DeletedFilter::from_query(Some("bogus")), DeletedFilter::Exclude);
    }

    fn sample_asset() -> MediaAsset {
        let now = Utc::now();
        MediaAsset {
            id: "m1".to_string(),
            filename: "abc-123.jpg".to_string(),
            original_filename: "photo.jpg".to_string(),
            content_type: "image/jpeg".to_string(),
            size: 1024,
            category: MediaCategory::Image,
            folder: "articles".to_string(),
            storage_path: "articles/abc-123.jpg".to_string(),
            public_url: "http://localhost:9000/rainbow-cms/articles/abc-123.jpg".to_string(),
            thumbnail_url: None,
            alt_text: None,
            caption: None,
            width: Some(800),
            height: Some(600),
            format: Some("jpeg".to_string()),
            is_optimized: true,
            used_in: Vec::new(),
            usage_count: 0,
            uploaded_by: "user_1".to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }
}

use crate::{
    config::Config,
    error::{AppError, Result},
    models::media::*,
    models::response::PaginatedResponse,
    services::{Database, StorageService},
    utils::{
        image::{ImageProcessOptions, ImageProcessor, ThumbnailOptions},
        sanitize, validation,
    },
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

const MEDIA_TABLE: &str = "media";

/// 媒体注册表服务
///
/// 负责媒体记录的全部持久化操作：上传入库、查询、元数据更新、
/// 使用引用的原子增删，以及带删除保护的（软）删除。
#[derive(Clone)]
pub struct MediaService {
    db: Arc<Database>,
    storage: StorageService,
    config: Config,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct TitleRow {
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryStatsRow {
    category: MediaCategory,
    count: i64,
    total_size: i64,
}

impl MediaService {
    pub async fn new(db: Arc<Database>, storage: StorageService, config: &Config) -> Result<Self> {
        Ok(Self {
            db,
            storage,
            config: config.clone(),
        })
    }

    /// 媒体公开地址的基础前缀，供引用解析使用
    pub fn public_base(&self) -> &str {
        self.storage.public_base()
    }

    /// 处理一次文件上传：校验、图片优化、写入对象存储、创建注册表记录。
    /// 图片解码失败会中止整个上传，不会留下损坏的记录。
    pub async fn upload(
        &self,
        user_id: &str,
        original_filename: &str,
        content_type: &str,
        data: Vec<u8>,
        options: UploadMediaOptions,
    ) -> Result<MediaUploadResponse> {
        validation::validate_mime_type(content_type)?;
        validation::validate_upload_size(data.len(), self.config.max_upload_size)?;

        let folder = validation::sanitize_folder(options.folder.as_deref());
        let alt_text = self.clean_bounded_text(options.alt_text, 500, "替代文本")?;
        let caption = self.clean_bounded_text(options.caption, 1000, "说明文字")?;

        let extension = validation::file_extension(content_type, original_filename);
        let filename = format!(
            "{}-{}.{}",
            Uuid::new_v4().simple(),
            Utc::now().timestamp_millis(),
            extension
        );

        if self.filename_exists(&filename).await? {
            return Err(AppError::Conflict(format!(
                "文件名已存在: {}",
                filename
            )));
        }

        let is_image = content_type.starts_with("image/");
        let original_size = data.len();

        // 图片经过优化管线，其他类型原样存储
        let (stored_bytes, image_info, thumbnail_bytes) = if is_image {
            let process_options = ImageProcessOptions {
                max_width: self.config.image_max_width,
                max_height: self.config.image_max_height,
                quality: self.config.image_quality,
            };
            let processed = ImageProcessor::optimize(&data, &process_options)?;
            let thumbnail_options = ThumbnailOptions {
                width: self.config.thumbnail_size,
                height: self.config.thumbnail_size,
                quality: self.config.thumbnail_quality,
            };
            let thumbnail = ImageProcessor::thumbnail(&data, &thumbnail_options)?;
            let info = StoredImageInfo {
                width: processed.width,
                height: processed.height,
                format: processed.format,
                is_optimized: processed.is_optimized,
                compression_ratio: processed.compression_ratio,
            };
            (processed.data, Some(info), Some(thumbnail))
        } else {
            (data, None, None)
        };

        let stored_size = stored_bytes.len();
        let storage_path = format!("{}/{}", folder, filename);
        let public_url = self
            .storage
            .put(&storage_path, stored_bytes, content_type)
            .await?;

        // 缩略图写入失败不中止上传，记录后继续
        let thumbnail_url = if let Some(thumbnail) = thumbnail_bytes {
            let thumbnail_key = format!("{}/thumbnails/{}", folder, filename);
            match self.storage.put(&thumbnail_key, thumbnail, "image/jpeg").await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Failed to store thumbnail {}: {}", thumbnail_key, e);
                    None
                }
            }
        } else {
            None
        };

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let asset = MediaAsset {
            id: id.clone(),
            filename: filename.clone(),
            original_filename: original_filename.to_string(),
            content_type: content_type.to_string(),
            size: stored_size as i64,
            category: MediaCategory::from_mime_type(content_type),
            folder,
            storage_path,
            public_url,
            thumbnail_url,
            alt_text,
            caption,
            width: image_info.as_ref().map(|i| i.width),
            height: image_info.as_ref().map(|i| i.height),
            format: image_info.as_ref().map(|i| i.format.clone()),
            is_optimized: image_info.as_ref().map(|i| i.is_optimized).unwrap_or(false),
            used_in: Vec::new(),
            usage_count: 0,
            uploaded_by: user_id.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let created = self.db.create_with_id(MEDIA_TABLE, &id, asset).await?;

        info!(
            "Uploaded media {} ({}) for user {}",
            created.id, created.filename, user_id
        );

        Ok(MediaUploadResponse {
            id: created.id.clone(),
            filename: created.filename.clone(),
            original_filename: created.original_filename.clone(),
            url: created.public_url.clone(),
            thumbnail_url: created.thumbnail_url.clone(),
            content_type: created.content_type.clone(),
            size: created.size,
            category: created.category,
            folder: created.folder.clone(),
            width: created.width,
            height: created.height,
            format: created.format.clone(),
            is_optimized: created.is_optimized,
            original_size: original_size as i64,
            optimized_size: created.size,
            compression_ratio: image_info
                .map(|i| i.compression_ratio)
                .unwrap_or(0.0),
        })
    }

    fn clean_bounded_text(
        &self,
        value: Option<String>,
        max_len: usize,
        field: &str,
    ) -> Result<Option<String>> {
        match value {
            None => Ok(None),
            Some(raw) => {
                if raw.chars().count() > max_len {
                    return Err(AppError::Validation(format!(
                        "{}不能超过{}个字符",
                        field, max_len
                    )));
                }
                let cleaned = sanitize::sanitize_text(&raw);
                Ok(Some(cleaned))
            }
        }
    }

    async fn filename_exists(&self, filename: &str) -> Result<bool> {
        let mut response = self
            .db
            .query_with_params(
                "SELECT count() AS count FROM media WHERE filename = $filename GROUP ALL",
                json!({ "filename": filename }),
            )
            .await?;
        let rows: Vec<CountRow> = response.take(0)?;
        Ok(rows.first().map(|r| r.count > 0).unwrap_or(false))
    }

    /// 获取记录，不过滤软删除状态
    pub async fn get_any(&self, id: &str) -> Result<MediaAsset> {
        self.db
            .get_by_id(MEDIA_TABLE, id)
            .await?
            .ok_or_else(|| AppError::not_found("Media file"))
    }

    /// 获取未删除的记录
    pub async fn get_live(&self, id: &str) -> Result<MediaAsset> {
        let asset = self.get_any(id).await?;
        if asset.is_deleted() {
            return Err(AppError::not_found("Media file"));
        }
        Ok(asset)
    }

    /// 单条详情，附带引用方信息
    pub async fn get_detail(&self, id: &str) -> Result<MediaDetailResponse> {
        let asset = self.get_live(id).await?;
        let used_in = self.lookup_usage_targets(&asset.used_in).await;

        Ok(MediaDetailResponse {
            media: asset.to_response(),
            used_in,
        })
    }

    /// 分页列表，默认排除软删除记录；`deleted=only|all` 可改变过滤方式
    pub async fn list(&self, query: &MediaListQuery) -> Result<PaginatedResponse<MediaResponse>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query
            .limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);
        let start = (page - 1) * limit;

        let mut conditions: Vec<&str> = Vec::new();
        match DeletedFilter::from_query(query.deleted.as_deref()) {
            DeletedFilter::Exclude => conditions.push("deleted_at IS NONE"),
            DeletedFilter::Only => conditions.push("deleted_at IS NOT NONE"),
            DeletedFilter::All => {}
        }
        if query.folder.is_some() {
            conditions.push("folder = $folder");
        }
        if query.content_type.is_some() {
            conditions.push("string::starts_with(content_type, $content_type)");
        }
        if query.search.is_some() {
            conditions.push(
                "(string::contains(string::lowercase(original_filename), $search) \
                 OR string::contains(string::lowercase(alt_text ?? ''), $search) \
                 OR string::contains(string::lowercase(caption ?? ''), $search))",
            );
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let order_by = match query.sort.as_deref() {
            Some("oldest") => "created_at ASC",
            Some("name") => "original_filename ASC",
            Some("size") => "size DESC",
            _ => "created_at DESC",
        };

        let params = json!({
            "folder": query.folder,
            "content_type": query.content_type,
            "search": query.search.as_deref().map(|s| s.to_lowercase()),
            "limit": limit,
            "start": start,
        });

        let sql = format!(
            "SELECT * FROM media {} ORDER BY {} LIMIT $limit START $start",
            where_clause, order_by
        );
        let mut response = self.db.query_with_params(&sql, &params).await?;
        let assets: Vec<MediaAsset> = response.take(0)?;

        let count_sql = format!("SELECT count() AS count FROM media {} GROUP ALL", where_clause);
        let mut count_response = self.db.query_with_params(&count_sql, &params).await?;
        let counts: Vec<CountRow> = count_response.take(0)?;
        let total = counts.first().map(|r| r.count).unwrap_or(0);

        let items = assets.iter().map(MediaAsset::to_response).collect();
        Ok(PaginatedResponse::new(items, page, limit, total))
    }

    /// 更新展示元数据；目录名重新净化。
    /// 目录仅作组织用途，已存储的对象不会移动。
    pub async fn update_metadata(
        &self,
        id: &str,
        request: &UpdateMediaRequest,
    ) -> Result<MediaAsset> {
        let asset = self.get_live(id).await?;

        let mut updates = serde_json::Map::new();
        if let Some(alt_text) = &request.alt_text {
            updates.insert(
                "alt_text".to_string(),
                json!(sanitize::sanitize_text(alt_text)),
            );
        }
        if let Some(caption) = &request.caption {
            updates.insert(
                "caption".to_string(),
                json!(sanitize::sanitize_text(caption)),
            );
        }
        if let Some(folder) = &request.folder {
            updates.insert(
                "folder".to_string(),
                json!(validation::sanitize_folder(Some(folder))),
            );
        }

        if updates.is_empty() {
            return Ok(asset);
        }
        updates.insert("updated_at".to_string(), json!(Utc::now()));

        self.db
            .merge_by_id(MEDIA_TABLE, id, serde_json::Value::Object(updates))
            .await?
            .ok_or_else(|| AppError::not_found("Media file"))
    }

    /// 注册一条使用引用。
    /// 服务端单语句完成集合并入与计数重算，并发调用下不会丢失更新；
    /// 重复注册同一引用是无操作。软删除的记录不接受新引用。
    pub async fn add_usage(&self, id: &str, model: &str, ref_id: &str) -> Result<()> {
        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('media', $id) \
                 SET used_in = array::union(used_in, [{ model: $model, ref_id: $ref_id }]), \
                     usage_count = array::len(used_in), \
                     updated_at = time::now() \
                 WHERE deleted_at IS NONE \
                 RETURN AFTER",
                json!({ "id": id, "model": model, "ref_id": ref_id }),
            )
            .await?;

        let updated: Vec<MediaAsset> = response.take(0)?;
        if updated.is_empty() {
            return Err(AppError::NotFound(format!(
                "Media file {} not found or deleted",
                id
            )));
        }

        debug!("Registered usage {}:{} on media {}", model, ref_id, id);
        Ok(())
    }

    /// 移除一条使用引用。移除不存在的引用（或记录本身已不存在）是无操作。
    pub async fn remove_usage(&self, id: &str, model: &str, ref_id: &str) -> Result<()> {
        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('media', $id) \
                 SET used_in = array::complement(used_in, [{ model: $model, ref_id: $ref_id }]), \
                     usage_count = array::len(used_in), \
                     updated_at = time::now() \
                 RETURN AFTER",
                json!({ "id": id, "model": model, "ref_id": ref_id }),
            )
            .await?;

        let updated: Vec<MediaAsset> = response.take(0)?;
        if updated.is_empty() {
            debug!("Media {} no longer exists, skipping usage removal", id);
        } else {
            debug!("Removed usage {}:{} from media {}", model, ref_id, id);
        }
        Ok(())
    }

    /// 按公开地址批量解析未删除的媒体记录
    pub async fn find_by_urls(&self, urls: &[String]) -> Result<Vec<MediaAsset>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM media WHERE public_url IN $urls AND deleted_at IS NONE",
                json!({ "urls": urls }),
            )
            .await?;
        let assets: Vec<MediaAsset> = response.take(0)?;
        Ok(assets)
    }

    /// 删除单个媒体文件：先删对象存储字节（含缩略图），再软删除记录。
    /// 仍被引用时拒绝，且不产生任何变更。
    pub async fn delete(&self, id: &str) -> Result<()> {
        let asset = self.get_live(id).await?;

        self.ensure_not_referenced(std::slice::from_ref(&asset)).await?;

        self.storage.delete(&asset.storage_path).await?;
        if asset.thumbnail_url.is_some() {
            if let Err(e) = self.storage.delete(&asset.thumbnail_key()).await {
                warn!("Failed to delete thumbnail for media {}: {}", asset.id, e);
            }
        }

        self.soft_delete_unreferenced(&asset.id).await?;

        info!("Deleted media {} ({})", asset.id, asset.filename);
        Ok(())
    }

    /// 批量删除：任一成员仍被引用则整批拒绝，并指明被阻塞的成员
    pub async fn bulk_delete(&self, ids: &[String]) -> Result<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut response = self
            .db
            .query_with_params(
                "SELECT * FROM media WHERE meta::id(id) IN $ids AND deleted_at IS NONE",
                json!({ "ids": ids }),
            )
            .await?;
        let assets: Vec<MediaAsset> = response.take(0)?;

        if assets.is_empty() {
            return Err(AppError::not_found("Media files"));
        }

        self.ensure_not_referenced(&assets).await?;

        let mut deleted = Vec::with_capacity(assets.len());
        for asset in &assets {
            self.storage.delete(&asset.storage_path).await?;
            if asset.thumbnail_url.is_some() {
                if let Err(e) = self.storage.delete(&asset.thumbnail_key()).await {
                    warn!("Failed to delete thumbnail for media {}: {}", asset.id, e);
                }
            }
            self.soft_delete_unreferenced(&asset.id).await?;
            deleted.push(asset.id.clone());
        }

        info!("Bulk deleted {} media files", deleted.len());
        Ok(deleted)
    }

    /// 恢复软删除的记录
    pub async fn restore(&self, id: &str) -> Result<MediaAsset> {
        let asset = self.get_any(id).await?;
        if !asset.is_deleted() {
            return Err(AppError::bad_request("媒体文件未被删除"));
        }

        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('media', $id) \
                 SET deleted_at = NONE, updated_at = time::now() \
                 RETURN AFTER",
                json!({ "id": id }),
            )
            .await?;
        let restored: Vec<MediaAsset> = response.take(0)?;

        restored
            .into_iter()
            .next()
            .ok_or_else(|| AppError::not_found("Media file"))
    }

    /// 读取对象存储中的文件内容（文件服务路由使用）
    pub async fn get_file(&self, path: &str) -> Result<Vec<u8>> {
        self.storage.get(path).await
    }

    /// 未删除资产的总量统计，按图片/文档分类细分
    pub async fn storage_stats(&self) -> Result<StorageStats> {
        let mut response = self
            .db
            .query(
                "SELECT category, count() AS count, math::sum(size) AS total_size \
                 FROM media WHERE deleted_at IS NONE GROUP BY category",
            )
            .await?;
        let rows: Vec<CategoryStatsRow> = response.take(0)?;

        let mut stats = StorageStats {
            total_files: 0,
            total_size: 0,
            images_count: 0,
            images_size: 0,
            documents_count: 0,
            documents_size: 0,
        };

        for row in rows {
            stats.total_files += row.count;
            stats.total_size += row.total_size;
            match row.category {
                MediaCategory::Image => {
                    stats.images_count = row.count;
                    stats.images_size = row.total_size;
                }
                MediaCategory::Document => {
                    stats.documents_count = row.count;
                    stats.documents_size = row.total_size;
                }
                _ => {}
            }
        }

        Ok(stats)
    }

    /// 按目录统计数量与字节数
    pub async fn folder_stats(&self) -> Result<Vec<FolderStats>> {
        let mut response = self
            .db
            .query(
                "SELECT folder, count() AS count, math::sum(size) AS total_size \
                 FROM media WHERE deleted_at IS NONE GROUP BY folder",
            )
            .await?;
        let mut stats: Vec<FolderStats> = response.take(0)?;
        stats.sort_by(|a, b| a.folder.cmp(&b.folder));
        Ok(stats)
    }

    /// 删除保护：任一资产的引用列表非空则拒绝，列出引用方
    async fn ensure_not_referenced(&self, assets: &[MediaAsset]) -> Result<()> {
        let blocked: Vec<&MediaAsset> = assets.iter().filter(|a| a.is_in_use()).collect();
        if blocked.is_empty() {
            return Ok(());
        }

        let mut details = Vec::with_capacity(blocked.len());
        for asset in &blocked {
            let targets = self.lookup_usage_targets(&asset.used_in).await;
            details.push(json!({
                "id": asset.id,
                "filename": asset.original_filename,
                "used_in": targets,
            }));
        }

        Err(AppError::media_in_use(
            format!("{}个媒体文件仍被内容引用，无法删除", blocked.len()),
            json!(details),
        ))
    }

    /// 引用方信息查询，尽力而为：查不到标题时只返回标识
    async fn lookup_usage_targets(&self, refs: &[UsageRef]) -> Vec<UsageTargetInfo> {
        let mut targets = Vec::with_capacity(refs.len());
        for usage in refs {
            let title = self.lookup_title(&usage.model, &usage.ref_id).await;
            targets.push(UsageTargetInfo {
                model: usage.model.clone(),
                ref_id: usage.ref_id.clone(),
                title,
            });
        }
        targets
    }

    async fn lookup_title(&self, model: &str, ref_id: &str) -> Option<String> {
        let result = self
            .db
            .query_with_params(
                "SELECT title FROM type::thing($model, $ref_id)",
                json!({ "model": model, "ref_id": ref_id }),
            )
            .await;

        match result {
            Ok(mut response) => {
                let rows: Vec<TitleRow> = response.take(0).ok()?;
                rows.into_iter().next().and_then(|r| r.title)
            }
            Err(e) => {
                debug!("Failed to look up {}:{} title: {}", model, ref_id, e);
                None
            }
        }
    }

    /// 注册表侧的最终软删除。引用检查与删除在同一条件语句中完成，
    /// 防止检查与写入之间被并发注册的引用绕过
    async fn soft_delete_unreferenced(&self, id: &str) -> Result<()> {
        let mut response = self
            .db
            .query_with_params(
                "UPDATE type::thing('media', $id) \
                 SET deleted_at = time::now(), updated_at = time::now() \
                 WHERE deleted_at IS NONE AND array::len(used_in) = 0 \
                 RETURN AFTER",
                json!({ "id": id }),
            )
            .await?;

        let updated: Vec<MediaAsset> = response.take(0)?;
        if updated.is_empty() {
            warn!("Media {} was referenced concurrently during delete", id);
            return Err(AppError::media_in_use(
                "媒体文件在删除过程中被引用，已中止".to_string(),
                json!([]),
            ));
        }
        Ok(())
    }
}

/// 图片经优化后写入记录的元数据
struct StoredImageInfo {
    width: u32,
    height: u32,
    format: String,
    is_optimized: bool,
    compression_ratio: f64,
}

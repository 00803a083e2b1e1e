use crate::{
    error::Result,
    models::media::{MediaAsset, UsageDriftEntry, UsageHealthReport},
    services::{Database, MediaService},
    utils::content,
};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 使用跟踪服务
///
/// 在内容实体（文章等）创建/更新/删除时，同步媒体注册表中的引用列表。
/// 每条引用的登记相互独立，单条失败只记录日志，不影响内容实体本身的
/// 写入——主实体的持久化优先于引用图的精确性。漂移通过按需的健康检查
/// 发现，而不是让跟踪参与主实体事务。
#[derive(Clone)]
pub struct UsageTrackerService {
    media: MediaService,
    db: Arc<Database>,
}

impl UsageTrackerService {
    pub async fn new(media: MediaService, db: Arc<Database>) -> Result<Self> {
        Ok(Self { media, db })
    }

    /// 从富文本内容解析出本系统内未删除媒体的ID列表。
    /// 第三方地址被过滤；无法解析到存活记录的地址静默丢弃。
    /// 返回顺序与内容中首次出现的顺序一致，去重。
    pub async fn extract_asset_ids(&self, html: &str) -> Result<Vec<String>> {
        let urls = content::extract_embedded_urls(html);
        if urls.is_empty() {
            return Ok(Vec::new());
        }

        let own_urls = content::filter_own_asset_urls(&urls, self.media.public_base());
        if own_urls.is_empty() {
            return Ok(Vec::new());
        }

        let assets = self.media.find_by_urls(&own_urls).await?;
        let by_url: HashMap<&str, &str> = assets
            .iter()
            .map(|a| (a.public_url.as_str(), a.id.as_str()))
            .collect();

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for url in &own_urls {
            if let Some(id) = by_url.get(url.as_str()) {
                if seen.insert(*id) {
                    ids.push((*id).to_string());
                }
            }
        }
        Ok(ids)
    }

    /// 内容实体创建后登记全部引用（封面图 + 内嵌图）
    pub async fn on_owner_created(
        &self,
        model: &str,
        owner_id: &str,
        html: &str,
        featured_image_id: Option<&str>,
    ) {
        let content_ids = self.resolve_content_ids(html).await;
        let ids = combine_references(&content_ids, featured_image_id);

        for id in &ids {
            if let Err(e) = self.media.add_usage(id, model, owner_id).await {
                warn!(
                    "Failed to register media usage {} for {}:{}: {}",
                    id, model, owner_id, e
                );
            }
        }

        debug!(
            "Registered {} media references for {}:{}",
            ids.len(),
            model,
            owner_id
        );
    }

    /// 内容实体更新后按差集调整引用：
    /// 新旧都存在的引用不做任何操作，避免无谓的计数抖动
    pub async fn on_owner_updated(
        &self,
        model: &str,
        owner_id: &str,
        old_html: &str,
        new_html: &str,
        old_featured: Option<&str>,
        new_featured: Option<&str>,
    ) {
        let old_ids = combine_references(&self.resolve_content_ids(old_html).await, old_featured);
        let new_ids = combine_references(&self.resolve_content_ids(new_html).await, new_featured);

        let (removed, added) = diff_references(&old_ids, &new_ids);

        for id in &removed {
            if let Err(e) = self.media.remove_usage(id, model, owner_id).await {
                warn!(
                    "Failed to remove media usage {} for {}:{}: {}",
                    id, model, owner_id, e
                );
            }
        }
        for id in &added {
            if let Err(e) = self.media.add_usage(id, model, owner_id).await {
                warn!(
                    "Failed to register media usage {} for {}:{}: {}",
                    id, model, owner_id, e
                );
            }
        }

        debug!(
            "Media references for {}:{} updated: {} removed, {} added",
            model,
            owner_id,
            removed.len(),
            added.len()
        );
    }

    /// 内容实体删除后移除其全部引用
    pub async fn on_owner_deleted(
        &self,
        model: &str,
        owner_id: &str,
        html: &str,
        featured_image_id: Option<&str>,
    ) {
        let content_ids = self.resolve_content_ids(html).await;
        let ids = combine_references(&content_ids, featured_image_id);

        for id in &ids {
            if let Err(e) = self.media.remove_usage(id, model, owner_id).await {
                warn!(
                    "Failed to remove media usage {} for {}:{}: {}",
                    id, model, owner_id, e
                );
            }
        }

        debug!(
            "Removed {} media references for {}:{}",
            ids.len(),
            model,
            owner_id
        );
    }

    async fn resolve_content_ids(&self, html: &str) -> Vec<String> {
        match self.extract_asset_ids(html).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Failed to resolve media references from content: {}", e);
                Vec::new()
            }
        }
    }

    /// 按需的引用图健康检查：重新从全部内容推导期望的引用集合，
    /// 与注册表实际记录逐一比对，报告漂移、计数不一致与孤儿文件
    pub async fn usage_health_report(&self) -> Result<UsageHealthReport> {
        #[derive(Debug, Deserialize)]
        struct OwnerRow {
            #[serde(with = "crate::utils::serde_helpers::thing_id")]
            id: String,
            content: String,
            featured_image_id: Option<String>,
        }

        let mut response = self
            .db
            .query("SELECT id, content, featured_image_id FROM post WHERE is_deleted = false")
            .await?;
        let owners: Vec<OwnerRow> = response.take(0)?;

        let mut response = self
            .db
            .query("SELECT * FROM media WHERE deleted_at IS NONE")
            .await?;
        let assets: Vec<MediaAsset> = response.take(0)?;
        let live_ids: HashSet<&str> = assets.iter().map(|a| a.id.as_str()).collect();

        // 期望的引用集合：媒体ID -> 引用它的文章ID列表
        let mut expected: HashMap<String, Vec<String>> = HashMap::new();
        for owner in &owners {
            let content_ids = self.resolve_content_ids(&owner.content).await;
            let featured = owner
                .featured_image_id
                .as_deref()
                .filter(|id| live_ids.contains(id));
            for media_id in combine_references(&content_ids, featured) {
                let entry = expected.entry(media_id).or_default();
                if !entry.contains(&owner.id) {
                    entry.push(owner.id.clone());
                }
            }
        }

        let mut drifted = Vec::new();
        let mut counter_mismatches = Vec::new();
        let mut orphans = Vec::new();

        for asset in &assets {
            if asset.usage_count as usize != asset.used_in.len() {
                counter_mismatches.push(asset.id.clone());
            }

            let actual: Vec<String> = asset
                .used_in
                .iter()
                .filter(|usage| usage.model == "post")
                .map(|usage| usage.ref_id.clone())
                .collect();
            let expected_refs = expected.get(&asset.id).cloned().unwrap_or_default();

            let (stale, missing) = diff_references(&actual, &expected_refs);
            if !stale.is_empty() || !missing.is_empty() {
                drifted.push(UsageDriftEntry {
                    media_id: asset.id.clone(),
                    filename: asset.original_filename.clone(),
                    missing,
                    stale,
                });
            }

            if asset.used_in.is_empty() && expected_refs.is_empty() {
                orphans.push(asset.id.clone());
            }
        }

        info!(
            "Usage health check: {} assets, {} owners, {} drifted, {} orphans",
            assets.len(),
            owners.len(),
            drifted.len(),
            orphans.len()
        );

        Ok(UsageHealthReport {
            checked_assets: assets.len(),
            checked_owners: owners.len(),
            drifted,
            counter_mismatches,
            orphans,
        })
    }
}

/// 内嵌引用与封面图引用合并为单一引用集合。
/// 封面图与内嵌图指向同一媒体时只计一条引用。
pub fn combine_references(content_ids: &[String], featured_image_id: Option<&str>) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut ids = Vec::new();

    if let Some(featured) = featured_image_id {
        if !featured.is_empty() && seen.insert(featured) {
            ids.push(featured.to_string());
        }
    }
    for id in content_ids {
        if seen.insert(id.as_str()) {
            ids.push(id.clone());
        }
    }
    ids
}

/// 计算引用集合差异：(旧-新, 新-旧)
pub fn diff_references(old_ids: &[String], new_ids: &[String]) -> (Vec<String>, Vec<String>) {
    let old_set: HashSet<&str> = old_ids.iter().map(String::as_str).collect();
    let new_set: HashSet<&str> = new_ids.iter().map(String::as_str).collect();

    let removed = old_ids
        .iter()
        .filter(|id| !new_set.contains(id.as_str()))
        .cloned()
        .collect();
    let added = new_ids
        .iter()
        .filter(|id| !old_set.contains(id.as_str()))
        .cloned()
        .collect();

    (removed, added)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_references_basic() {
        // {A, B} -> {A, C}: B移除，C新增，A不动
        let (removed, added) = diff_references(&ids(&["a", "b"]), &ids(&["a", "c"]));
        assert_eq!(removed, ids(&["b"]));
        assert_eq!(added, ids(&["c"]));
    }

    #[test]
    fn test_diff_references_no_change() {
        let (removed, added) = diff_references(&ids(&["a", "b"]), &ids(&["b", "a"]));
        assert!(removed.is_empty());
        assert!(added.is_empty());
    }

    #[test]
    fn test_diff_references_empty_sides() {
        let (removed, added) = diff_references(&[], &ids(&["a"]));
        assert!(removed.is_empty());
        assert_eq!(added, ids(&["a"]));

        let (removed, added) = diff_references(&ids(&["a"]), &[]);
        assert_eq!(removed, ids(&["a"]));
        assert!(added.is_empty());
    }

    #[test]
    fn test_combine_references_dedups_featured() {
        // 封面图同时内嵌在正文里，只计一条引用
        let combined = combine_references(&ids(&["a", "b"]), Some("a"));
        assert_eq!(combined, ids(&["a", "b"]));
    }

    #[test]
    fn test_combine_references_featured_first() {
        let combined = combine_references(&ids(&["b"]), Some("c"));
        assert_eq!(combined, ids(&["c", "b"]));
    }

    #[test]
    fn test_combine_references_without_featured() {
        assert_eq!(combine_references(&ids(&["a"]), None), ids(&["a"]));
        assert!(combine_references(&[], None).is_empty());
        assert!(combine_references(&[], Some("")).is_empty());
    }

    #[test]
    fn test_featured_change_via_combined_diff() {
        // 封面从C换成D，内容引用{A}不变
        let old = combine_references(&ids(&["a"]), Some("c"));
        let new = combine_references(&ids(&["a"]), Some("d"));
        let (removed, added) = diff_references(&old, &new);
        assert_eq!(removed, ids(&["c"]));
        assert_eq!(added, ids(&["d"]));
    }
}

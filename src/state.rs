use crate::{
    config::Config,
    services::{
        auth::AuthService, database::Database, media::MediaService, post::PostService,
        usage::UsageTrackerService,
    },
};
use std::sync::Arc;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Arc<Database>,

    /// 认证服务
    pub auth_service: Arc<AuthService>,

    /// 媒体注册表服务
    pub media_service: MediaService,

    /// 使用跟踪服务
    pub usage_tracker: UsageTrackerService,

    /// 文章服务
    pub post_service: PostService,
}

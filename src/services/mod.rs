pub mod auth;
pub mod database;
pub mod media;
pub mod post;
pub mod storage;
pub mod usage;

// 重新导出常用类型
pub use auth::AuthService;
pub use database::Database;
pub use media::MediaService;
pub use post::PostService;
pub use storage::StorageService;
pub use usage::UsageTrackerService;

use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, Router},
    http::{HeaderValue, Method},
    Extension,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod error;
mod models;
mod routes;
mod services;
mod state;
mod utils;

use crate::{
    config::Config,
    services::{
        AuthService, Database, MediaService, PostService, StorageService, UsageTrackerService,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("LOG_LEVEL").unwrap_or_else(|_| "rainbow_cms=debug,tower_http=debug".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rainbow-CMS service...");

    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化数据库连接
    let db = Arc::new(match Database::new(&config).await {
        Ok(db) => {
            db.verify_connection().await?;
            info!("Database connection established successfully");
            db
        }
        Err(e) => {
            error!("Failed to create database connection: {}", e);
            return Err(anyhow::anyhow!("Database initialization failed"));
        }
    });

    // 初始化对象存储；桶的准备是幂等的，失败不阻止启动
    let storage_service = StorageService::new(&config).await?;
    if let Err(e) = storage_service.ensure_bucket().await {
        warn!("Bucket provisioning failed, uploads will fail until storage is reachable: {}", e);
    }

    // 初始化所有服务
    let auth_service = Arc::new(AuthService::new(&config).await?);
    let media_service = MediaService::new(db.clone(), storage_service, &config).await?;
    let usage_tracker = UsageTrackerService::new(media_service.clone(), db.clone()).await?;
    let post_service = PostService::new(db.clone(), usage_tracker.clone()).await?;

    // 创建应用状态
    let app_state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth_service: auth_service.clone(),
        media_service,
        usage_tracker,
        post_service,
    });

    // 配置 CORS
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(
            config.cors_allowed_origins
                .split(',')
                .map(|origin| origin.parse::<HeaderValue>().unwrap())
                .collect::<Vec<_>>(),
        );

    // 构建应用路由 - 使用/api/cms/前缀避免网关路由冲突
    let app = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/cms/media", routes::media::router())
        .nest("/api/cms/posts", routes::posts::router())
        // 请求体上限略高于上传上限，超限文件交给上传校验给出明确错误
        .layer(DefaultBodyLimit::max(config.max_upload_size as usize + 1024 * 1024))
        .layer(Extension(auth_service))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // 启动主服务器
    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "Rainbow-CMS is running!"
}

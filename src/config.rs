use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub server_host: String,
    pub server_port: u16,
    pub environment: String,
    pub log_level: String,

    // Database configuration
    pub database_url: String,
    pub database_namespace: String,
    pub database_name: String,
    pub database_username: String,
    pub database_password: String,

    // Authentication configuration
    pub auth_service_url: String,
    pub auth_service_token: String,
    pub jwt_secret: String,

    // Storage configuration
    pub s3_endpoint: String,
    pub s3_public_url: Option<String>,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub s3_use_path_style: bool,
    pub max_upload_size: u64,

    // Content settings
    pub max_post_length: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,

    // Image processing
    pub image_max_width: u32,
    pub image_max_height: u32,
    pub image_quality: u8,
    pub thumbnail_size: u32,
    pub thumbnail_quality: u8,

    // CORS configuration
    pub cors_allowed_origins: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            database_namespace: env::var("DATABASE_NAMESPACE")
                .unwrap_or_else(|_| "rainbow".to_string()),
            database_name: env::var("DATABASE_NAME")
                .unwrap_or_else(|_| "cms".to_string()),
            database_username: env::var("DATABASE_USERNAME")
                .unwrap_or_else(|_| "root".to_string()),
            database_password: env::var("DATABASE_PASSWORD")
                .unwrap_or_else(|_| "root".to_string()),

            auth_service_url: env::var("AUTH_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            auth_service_token: env::var("AUTH_SERVICE_TOKEN")
                .unwrap_or_else(|_| "default-token".to_string()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),

            s3_endpoint: env::var("S3_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            s3_public_url: env::var("S3_PUBLIC_URL").ok(),
            s3_bucket: env::var("S3_BUCKET")
                .unwrap_or_else(|_| "rainbow-cms".to_string()),
            s3_region: env::var("S3_REGION")
                .unwrap_or_else(|_| "us-east-1".to_string()),
            s3_access_key: env::var("S3_ACCESS_KEY")
                .unwrap_or_else(|_| "minioadmin".to_string()),
            s3_secret_key: env::var("S3_SECRET_KEY")
                .unwrap_or_else(|_| "minioadmin".to_string()),
            s3_use_path_style: env::var("S3_USE_PATH_STYLE")
                .unwrap_or_else(|_| "true".to_string())
                .parse()?,
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .unwrap_or_else(|_| "10485760".to_string())
                .parse()?,

            max_post_length: env::var("MAX_POST_LENGTH")
                .unwrap_or_else(|_| "100000".to_string())
                .parse()?,
            default_page_size: env::var("DEFAULT_PAGE_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            max_page_size: env::var("MAX_PAGE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,

            image_max_width: env::var("IMAGE_MAX_WIDTH")
                .unwrap_or_else(|_| "1920".to_string())
                .parse()?,
            image_max_height: env::var("IMAGE_MAX_HEIGHT")
                .unwrap_or_else(|_| "1920".to_string())
                .parse()?,
            image_quality: env::var("IMAGE_QUALITY")
                .unwrap_or_else(|_| "85".to_string())
                .parse()?,
            thumbnail_size: env::var("THUMBNAIL_SIZE")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            thumbnail_quality: env::var("THUMBNAIL_QUALITY")
                .unwrap_or_else(|_| "80".to_string())
                .parse()?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// 媒体文件公开访问的基础地址（不带末尾斜杠）
    /// 未配置 S3_PUBLIC_URL 时直接使用存储端点
    pub fn storage_public_base(&self) -> String {
        let base = self
            .s3_public_url
            .as_deref()
            .unwrap_or(&self.s3_endpoint)
            .trim_end_matches('/')
            .to_string();
        format!("{}/{}", base, self.s3_bucket)
    }
}

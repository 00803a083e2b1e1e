use crate::{config::Config, error::{AppError, Result}};
use axum::{
    async_trait,
    extract::FromRequestParts,
    headers::{authorization::Bearer, Authorization},
    http::request::Parts,
    Extension, RequestPartsExt, TypedHeader,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

#[derive(Clone)]
pub struct AuthService {
    config: Config,
    http_client: Client,
    user_cache: Arc<RwLock<HashMap<String, CachedUser>>>,
    permission_cache: Arc<RwLock<HashMap<String, CachedPermission>>>,
}

#[derive(Debug, Clone)]
struct CachedUser {
    user: User,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CachedPermission {
    has_permission: bool,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
    pub session_id: Option<String>, // 会话ID
    pub email: Option<String>,      // 邮箱
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RainbowAuthUserResponse {
    pub id: String,
    pub email: String,
    pub username: Option<String>,
    pub email_verified: bool,
    pub created_at: String,
    pub profile: Option<UserProfileResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl AuthService {
    pub async fn new(config: &Config) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            http_client,
            user_cache: Arc::new(RwLock::new(HashMap::new())),
            permission_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.config.jwt_secret.as_ref());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    pub async fn get_user_from_rainbow_auth(&self, user_id: &str, token: &str) -> Result<User> {
        // 检查缓存
        if let Some(cached_user) = self.get_cached_user(user_id).await {
            debug!("Using cached user data for user: {}", user_id);
            return Ok(cached_user);
        }

        // 调用 Rainbow-Auth 获取用户信息
        let url = format!("{}/api/users/me", self.config.auth_service_url);

        let response = self.http_client
            .get(&url)
            .header("Authorization", format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| {
                error!("Failed to fetch user from Rainbow-Auth: {}", e);
                AppError::ExternalService("Failed to verify user with Rainbow-Auth".to_string())
            })?;

        if !response.status().is_success() {
            warn!("Rainbow-Auth returned error status: {}", response.status());
            return Err(AppError::Authentication("Invalid credentials".to_string()));
        }

        let user_data: RainbowAuthUserResponse = response.json().await
            .map_err(|e| {
                error!("Failed to parse Rainbow-Auth response: {}", e);
                AppError::Authentication("Invalid response from Rainbow-Auth".to_string())
            })?;

        let user = User {
            id: user_data.id.clone(),
            email: user_data.email,
            username: user_data.username,
            display_name: user_data.profile.as_ref().and_then(|p| p.display_name.clone()),
            roles: vec!["user".to_string()], // 基础角色
            is_verified: user_data.email_verified,
            created_at: chrono::DateTime::parse_from_rfc3339(&user_data.created_at)
                .unwrap_or_else(|_| Utc::now().into())
                .with_timezone(&Utc),
        };

        // 缓存用户数据
        self.cache_user(&user_data.id, user.clone()).await;

        Ok(user)
    }

    /// 权限判定：`(用户, 所需权限) -> 允许/拒绝`，所有写接口都经过这里
    pub async fn check_permission(&self, user_id: &str, permission: &str) -> Result<bool> {
        // 检查权限缓存
        let cache_key = format!("{}:{}", user_id, permission);
        if let Some(cached_permission) = self.get_cached_permission(&cache_key).await {
            debug!("Using cached permission for {}: {}", cache_key, cached_permission);
            return Ok(cached_permission);
        }

        // 内容管理系统权限检查逻辑
        let has_permission = match permission {
            // 读取权限（所有认证用户）
            "media.read" | "post.read" => true,

            // 写入权限（认证用户）
            "media.upload" | "media.update" | "post.create" | "post.update" => true,

            // 删除权限（简化处理，实际需要检查所有权或管理员角色）
            "media.delete" | "post.delete" => true,

            // 管理权限
            "media.manage" => true,

            _ => false,
        };

        // 缓存权限结果
        self.cache_permission(&cache_key, has_permission).await;

        Ok(has_permission)
    }

    async fn get_cached_user(&self, user_id: &str) -> Option<User> {
        let cache = self.user_cache.read().await;
        if let Some(cached) = cache.get(user_id) {
            if cached.expires_at > Utc::now() {
                return Some(cached.user.clone());
            }
        }
        None
    }

    async fn cache_user(&self, user_id: &str, user: User) {
        let mut cache = self.user_cache.write().await;
        cache.insert(user_id.to_string(), CachedUser {
            user,
            expires_at: Utc::now() + Duration::minutes(15), // 缓存15分钟
        });
    }

    async fn get_cached_permission(&self, cache_key: &str) -> Option<bool> {
        let cache = self.permission_cache.read().await;
        if let Some(cached) = cache.get(cache_key) {
            if cached.expires_at > Utc::now() {
                return Some(cached.has_permission);
            }
        }
        None
    }

    async fn cache_permission(&self, cache_key: &str, has_permission: bool) {
        let mut cache = self.permission_cache.write().await;
        cache.insert(cache_key.to_string(), CachedPermission {
            has_permission,
            expires_at: Utc::now() + Duration::minutes(10), // 权限缓存10分钟
        });
    }

    // 检查用户是否为内容作者
    pub async fn check_ownership(&self, user_id: &str, author_id: &str) -> bool {
        user_id == author_id
    }
}

// Axum extractor for authentication
#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        // 从请求头中提取 Authorization
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Authentication("Missing authorization header".to_string()))?;

        // 从请求扩展中获取认证服务
        let Extension(auth_service): Extension<Arc<AuthService>> = parts
            .extract::<Extension<Arc<AuthService>>>()
            .await
            .map_err(|_| AppError::Internal("Auth service not found in request extensions".to_string()))?;

        // 验证 JWT token
        let claims = auth_service.verify_jwt(bearer.token())?;

        // 从 Rainbow-Auth 获取用户详细信息
        auth_service.get_user_from_rainbow_auth(&claims.sub, bearer.token()).await
    }
}

// 权限检查的辅助宏
#[macro_export]
macro_rules! require_permission {
    ($auth_service:expr, $user:expr, $permission:expr) => {
        if !$auth_service.check_permission(&$user.id, $permission).await? {
            return Err(AppError::Authorization(format!("Permission '{}' required", $permission)));
        }
    };
}

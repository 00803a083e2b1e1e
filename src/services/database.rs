use crate::config::Config;
use crate::error::{AppError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;
use surrealdb::engine::remote::http::{Client, Http};
use surrealdb::opt::auth::Root;
use surrealdb::{Response, Surreal};
use tracing::{error, info};

/// 数据库服务
#[derive(Clone)]
pub struct Database {
    pub client: Surreal<Client>,
    pub config: Config,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        info!("Initializing database connection to {}", config.database_url);

        // HTTP引擎的地址不带协议前缀
        let address = config
            .database_url
            .trim_start_matches("http://")
            .trim_start_matches("https://");

        let client = Surreal::new::<Http>(address).await?;

        client
            .signin(Root {
                username: &config.database_username,
                password: &config.database_password,
            })
            .await?;

        client
            .use_ns(&config.database_namespace)
            .use_db(&config.database_name)
            .await?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match self.client.query("INFO FOR DB").await {
            Ok(_) => {
                info!("Database connection verified successfully");
                Ok(())
            }
            Err(e) => {
                error!("Failed to verify database connection: {}", e);
                Err(AppError::from(e))
            }
        }
    }

    /// 执行原始SQL查询
    pub async fn query(&self, sql: &str) -> Result<Response> {
        self.client.query(sql).await.map_err(AppError::from)
    }

    /// 执行带参数的查询
    pub async fn query_with_params<P>(&self, sql: &str, params: P) -> Result<Response>
    where
        P: Serialize,
    {
        self.client
            .query(sql)
            .bind(params)
            .await
            .map_err(AppError::from)
    }

    /// 以指定ID创建记录
    pub async fn create_with_id<T>(&self, table: &str, id: &str, data: T) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + Debug + 'static,
    {
        let created: Option<T> = self.client.create((table, id)).content(data).await?;

        created.ok_or_else(|| AppError::Internal("Failed to create record".to_string()))
    }

    /// 通过ID获取单个记录
    pub async fn get_by_id<T>(&self, table: &str, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + Debug,
    {
        self.client
            .select((table, id))
            .await
            .map_err(AppError::from)
    }

    /// 通过ID整体替换记录内容
    pub async fn update_by_id<T>(&self, table: &str, id: &str, data: T) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + Sync + Debug + 'static,
    {
        self.client
            .update((table, id))
            .content(data)
            .await
            .map_err(AppError::from)
    }

    /// 通过ID使用JSON数据合并更新记录
    pub async fn merge_by_id<T>(
        &self,
        table: &str,
        id: &str,
        updates: serde_json::Value,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + Debug,
    {
        self.client
            .update((table, id))
            .merge(updates)
            .await
            .map_err(AppError::from)
    }

    /// 通过ID删除记录
    pub async fn delete_by_id(&self, table: &str, id: &str) -> Result<()> {
        let _: Option<serde_json::Value> = self
            .client
            .delete((table, id))
            .await
            .map_err(AppError::from)?;
        Ok(())
    }
}

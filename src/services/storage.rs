use crate::{config::Config, error::{AppError, Result}};
use aws_sdk_s3::types::{ByteStream, SdkError};
use aws_sdk_s3::{Client, Credentials, Region};
use serde_json::json;
use tracing::{debug, info, warn};

/// 对象存储服务
///
/// 对S3兼容存储（MinIO等）的薄封装，不承载任何业务规则。
/// `put`/`delete` 失败统一以 `AppError::StorageUnavailable` 上抛，
/// 由调用方决定是否致命。
#[derive(Clone)]
pub struct StorageService {
    client: Client,
    bucket: String,
    public_base: String,
}

impl StorageService {
    pub async fn new(config: &Config) -> Result<Self> {
        let credentials = Credentials::new(
            &config.s3_access_key,
            &config.s3_secret_key,
            None,
            None,
            "rainbow-cms",
        );

        let shared_config = aws_config::from_env()
            .region(Region::new(config.s3_region.clone()))
            .endpoint_url(&config.s3_endpoint)
            .credentials_provider(credentials)
            .load()
            .await;

        // MinIO等兼容实现需要路径风格的桶寻址
        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(config.s3_use_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            bucket: config.s3_bucket.clone(),
            public_base: config.storage_public_base(),
        })
    }

    /// 进程启动时幂等地准备存储桶：不存在则创建，并只在首次创建时
    /// 设置公开读策略。失败不应阻止服务启动，由调用方记录并继续。
    pub async fn ensure_bucket(&self) -> Result<()> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                debug!("Bucket {} already exists", self.bucket);
                return Ok(());
            }
            Err(e) => {
                debug!("Bucket {} not reachable ({}), attempting to create", self.bucket, e);
            }
        }

        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!("Created bucket {}", self.bucket);
                self.apply_public_read_policy().await?;
                Ok(())
            }
            Err(SdkError::ServiceError(context)) => {
                let err = context.err();
                if err.is_bucket_already_owned_by_you() || err.is_bucket_already_exists() {
                    debug!("Bucket {} already exists", self.bucket);
                    Ok(())
                } else {
                    Err(AppError::StorageUnavailable(format!(
                        "create bucket {}: {}",
                        self.bucket, err
                    )))
                }
            }
            Err(e) => Err(AppError::StorageUnavailable(format!(
                "create bucket {}: {}",
                self.bucket, e
            ))),
        }
    }

    async fn apply_public_read_policy(&self) -> Result<()> {
        let policy = json!({
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Principal": {"AWS": ["*"]},
                "Action": ["s3:GetObject"],
                "Resource": [format!("arn:aws:s3:::{}/*", self.bucket)]
            }]
        });

        self.client
            .put_bucket_policy()
            .bucket(&self.bucket)
            .policy(policy.to_string())
            .send()
            .await
            .map_err(|e| {
                AppError::StorageUnavailable(format!("set bucket policy: {}", e))
            })?;

        info!("Applied public-read policy to bucket {}", self.bucket);
        Ok(())
    }

    /// 上传对象并返回公开访问地址
    pub async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String> {
        let size = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_length(size as i64)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::StorageUnavailable(format!("put object {}: {}", key, e)))?;

        debug!("Stored object {} ({} bytes)", key, size);
        Ok(self.public_url(key))
    }

    /// 读取对象内容
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(context) if context.err().is_no_such_key() => {
                    AppError::not_found("File")
                }
                _ => AppError::StorageUnavailable(format!("get object {}: {}", key, e)),
            })?;

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| AppError::StorageUnavailable(format!("read object {}: {}", key, e)))?;

        Ok(body.into_bytes().to_vec())
    }

    /// 删除对象
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::StorageUnavailable(format!("delete object {}: {}", key, e)))?;

        debug!("Deleted object {}", key);
        Ok(())
    }

    /// 检查对象是否存在。NotFound返回false，其他错误照常上抛
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(context)) if context.err().is_not_found() => Ok(false),
            Err(e) => Err(AppError::StorageUnavailable(format!(
                "check object {}: {}",
                key, e
            ))),
        }
    }

    /// 对象的公开访问地址
    pub fn public_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.public_base, encoded.join("/"))
    }

    pub fn public_base(&self) -> &str {
        &self.public_base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> StorageService {
        let credentials = Credentials::new("test", "test", None, None, "test");
        let s3_config = aws_sdk_s3::Config::builder()
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        StorageService {
            client: Client::from_conf(s3_config),
            bucket: "rainbow-cms".to_string(),
            public_base: "http://localhost:9000/rainbow-cms".to_string(),
        }
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let storage = test_service();
        assert_eq!(
            storage.public_url("articles/abc-123.jpg"),
            "http://localhost:9000/rainbow-cms/articles/abc-123.jpg"
        );
        assert_eq!(
            storage.public_url("articles/thumbnails/abc-123.jpg"),
            "http://localhost:9000/rainbow-cms/articles/thumbnails/abc-123.jpg"
        );
    }
}

use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use bytes::Bytes;
use tracing::{debug, info};

use super::{Device, StorageError};

/// S3 (MinIO) bucket exposed as a storage device. Paths are object keys.
#[derive(Clone)]
pub struct S3Device {
    pub client: Client,
    pub bucket: String,
    root: String,
}

impl S3Device {
    pub fn new(client: Client, bucket: &str, root: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            root: root.trim_matches('/').to_string(),
        }
    }

    pub fn connect(endpoint: &str, access_key: &str, secret_key: &str) -> Client {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .build();

        info!("✅ Connected to S3 (MinIO)");

        Client::from_conf(config)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("Failed to list {}: {}", prefix, e)))?;

            keys.extend(page.contents().iter().filter_map(|o| o.key().map(str::to_string)));

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl Device for S3Device {
    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    StorageError::NotFound(path.to_string())
                } else {
                    StorageError::Backend(format!("Failed to download {}: {}", path, e))
                }
            })?;

        let body = result
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to read body of {}: {}", path, e)))?;

        Ok(body.into_bytes())
    }

    async fn write(&self, path: &str, data: Bytes, mime: &str) -> Result<(), StorageError> {
        debug!("⬆️ Uploading {} ({} bytes, {})", path, data.len(), mime);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .content_type(mime)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to upload {}: {}", path, e)))?;

        Ok(())
    }

    async fn delete_path(&self, path: &str) -> Result<(), StorageError> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let keys = self.list_keys(&prefix).await?;

        for key in &keys {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("Failed to delete {}: {}", key, e)))?;
        }

        debug!("🗑️ Deleted {} objects under {}", keys.len(), prefix);
        Ok(())
    }

    fn root(&self) -> &str {
        &self.root
    }
}

//! AWS S3 blob store.
//!
//! Keys are stored as `{bucket}/{prefix}/{key}`.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::BlobStore;

/// S3-backed blob store.
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 store instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create an S3 store from the ambient AWS configuration.
    pub async fn from_config(storage: &StorageConfig) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let client = Client::new(&config);
        Self::new(client, &storage.bucket, &storage.prefix)
    }

    fn object_key(&self, key: &str) -> String {
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}/{key}")
        }
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(AppError::storage)?;
                Ok(Some(bytes.into_bytes().to_vec()))
            }
            Err(err) => {
                // Check if it's a "not found" error
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing data at s3://{}/{}", self.bucket, object_key);
                    Ok(None)
                } else {
                    Err(AppError::storage(service_err))
                }
            }
        }
    }

    async fn save(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let object_key = self.object_key(key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type("application/json")
            .send()
            .await
            .map_err(AppError::storage)?;

        log::info!("Wrote {} bytes to s3://{}/{}", bytes.len(), self.bucket, object_key);
        Ok(())
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key(key))
    }
}

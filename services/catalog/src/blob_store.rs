use crate::config::StorageConfig;
use anyhow::Result;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Characters left readable in object locators
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("{0}")]
    Upload(String),
}

/// Stores bytes under a named container and key.
///
/// Writes overwrite any existing object with the same key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` and return the locator of the written object
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, BlobStoreError>;
}

/// S3-compatible blob store
pub struct S3BlobStore {
    client: S3Client,
    base_url: String,
    multipart_threshold_bytes: usize,
    part_size_bytes: usize,
}

impl S3BlobStore {
    /// Create a new store with a client shared by all requests
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());
        let base_url = locator_base(config);

        info!(
            region = %config.region,
            base_url = %base_url,
            "Blob store initialized"
        );

        Ok(Self {
            client,
            base_url,
            multipart_threshold_bytes: config.multipart_threshold_bytes,
            part_size_bytes: config.part_size_bytes,
        })
    }

    /// Simple single-part upload for small files
    async fn simple_upload(
        &self,
        container: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), BlobStoreError> {
        self.client
            .put_object()
            .bucket(container)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BlobStoreError::Upload(DisplayErrorContext(e).to_string()))?;

        Ok(())
    }

    /// Multipart upload for large files
    async fn multipart_upload(
        &self,
        container: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<(), BlobStoreError> {
        let create_response = self
            .client
            .create_multipart_upload()
            .bucket(container)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| BlobStoreError::Upload(DisplayErrorContext(e).to_string()))?;

        let upload_id = create_response
            .upload_id()
            .ok_or_else(|| BlobStoreError::Upload("No upload ID in response".to_string()))?
            .to_string();

        match self.upload_parts(container, key, &upload_id, data).await {
            Ok(completed_parts) => {
                let completed_upload = CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build();

                self.client
                    .complete_multipart_upload()
                    .bucket(container)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed_upload)
                    .send()
                    .await
                    .map_err(|e| BlobStoreError::Upload(DisplayErrorContext(e).to_string()))?;

                Ok(())
            }
            Err(e) => {
                // Release the parts already stored before reporting the failure
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(container)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(
                        error = %DisplayErrorContext(abort_err),
                        upload_id = %upload_id,
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        container: &str,
        key: &str,
        upload_id: &str,
        data: Bytes,
    ) -> Result<Vec<CompletedPart>, BlobStoreError> {
        let mut completed_parts = Vec::new();
        let mut part_number = 1;
        let mut offset = 0;

        while offset < data.len() {
            let end = (offset + self.part_size_bytes).min(data.len());
            let body = ByteStream::from(data.slice(offset..end));

            let upload_part_response = self
                .client
                .upload_part()
                .bucket(container)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(body)
                .send()
                .await
                .map_err(|e| BlobStoreError::Upload(DisplayErrorContext(e).to_string()))?;

            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(upload_part_response.e_tag().unwrap_or_default())
                    .build(),
            );

            part_number += 1;
            offset = end;
        }

        Ok(completed_parts)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[instrument(skip(self, data), fields(size_bytes = data.len()))]
    async fn put_object(
        &self,
        container: &str,
        key: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String, BlobStoreError> {
        let size_bytes = data.len();

        if size_bytes > self.multipart_threshold_bytes {
            debug!(parts = size_bytes.div_ceil(self.part_size_bytes), "Using multipart upload");
            self.multipart_upload(container, key, content_type, data)
                .await?;
        } else {
            self.simple_upload(container, key, content_type, data).await?;
        }

        let locator = object_url(&self.base_url, container, key);

        info!(locator = %locator, size_bytes, "Object stored");

        Ok(locator)
    }
}

/// Base URL for locators: explicit public URL, then endpoint, then AWS default
fn locator_base(config: &StorageConfig) -> String {
    config
        .public_base_url
        .as_deref()
        .or(config.endpoint_url.as_deref())
        .map(|url| url.trim_end_matches('/').to_string())
        .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", config.region))
}

/// Path-style locator for an object
pub fn object_url(base_url: &str, container: &str, key: &str) -> String {
    format!(
        "{}/{}/{}",
        base_url,
        container,
        utf8_percent_encode(key, KEY_ENCODE_SET)
    )
}

//! Object storage
//!
//! The harvest artifact and its sidecar land in S3-compatible storage.
//! Trait-based so the driver can be exercised against an in-memory
//! store in tests.

use std::path::Path;

use async_trait::async_trait;
use aws_credential_types::provider::ProvideCredentials;
use tracing::{error, info};

/// Storage seam used by the driver: credential check up front, file
/// uploads at the end of the run.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Verifies credentials are usable before any API work starts.
    async fn authenticate(&self) -> bool;

    /// Copies a local file to `bucket` under `key`.
    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> bool;
}

/// S3 implementation over the AWS SDK.
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    sdk_config: aws_config::SdkConfig,
}

impl S3ObjectStore {
    /// Builds a store from ambient AWS configuration; a custom
    /// endpoint switches to path-style addressing for S3-compatible
    /// services.
    pub async fn new(endpoint_url: Option<&str>) -> Self {
        let sdk_config = aws_config::from_env().load().await;

        let s3_config = if let Some(endpoint) = endpoint_url {
            aws_sdk_s3::config::Builder::from(&sdk_config)
                .endpoint_url(endpoint)
                .force_path_style(true)
                .build()
        } else {
            aws_sdk_s3::config::Builder::from(&sdk_config).build()
        };

        let client = aws_sdk_s3::Client::from_conf(s3_config);
        Self { client, sdk_config }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStore {
    async fn authenticate(&self) -> bool {
        let Some(provider) = self.sdk_config.credentials_provider() else {
            error!("No AWS credentials provider configured");
            return false;
        };
        match provider.provide_credentials().await {
            Ok(_) => true,
            Err(e) => {
                error!(error = %e, "AWS credential resolution failed");
                false
            }
        }
    }

    async fn upload_file(&self, local_path: &Path, bucket: &str, key: &str) -> bool {
        let body = match aws_sdk_s3::primitives::ByteStream::from_path(local_path).await {
            Ok(body) => body,
            Err(e) => {
                error!(path = %local_path.display(), error = %e, "Could not read upload source");
                return false;
            }
        };

        match self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
        {
            Ok(_) => {
                info!(bucket = %bucket, key = %key, "Uploaded file");
                true
            }
            Err(e) => {
                error!(bucket = %bucket, key = %key, error = %e, "Upload failed");
                false
            }
        }
    }
}

//! Object storage collaborator
//!
//! Produces delivery URLs for stored videos using Cloudflare R2 / AWS S3:
//! presigned, time-limited links first, permanent public links as a fallback.

use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while producing delivery URLs
#[derive(Error, Debug)]
pub enum StorageError {
    /// Presigning configuration was rejected (e.g. TTL out of range)
    #[error("Presign config error: {0}")]
    PresignConfig(String),
    /// Signing the request failed
    #[error("Presign error: {0}")]
    Presign(String),
}

/// Interface for object storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Produce a signed URL for `path` valid for `ttl`
    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String, StorageError>;

    /// Produce a permanent public URL, if the bucket is publicly reachable
    fn public_url(&self, bucket: &str, path: &str) -> Option<String>;
}

/// R2-backed object store
pub struct R2Storage {
    client: Client,
    public_base_url: Option<String>,
}

impl R2Storage {
    /// Create a new R2 storage client.
    ///
    /// Explicit access keys are used when present; otherwise the default AWS
    /// credential chain applies. No network call happens here.
    pub async fn new(settings: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "r2-storage");
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = &settings.endpoint_url {
            s3_config = s3_config.endpoint_url(endpoint_url).force_path_style(true);
        }

        let client = Client::from_conf(s3_config.build());
        info!(
            "R2 storage client initialized (endpoint: {}, public base: {})",
            settings.endpoint_url.as_deref().unwrap_or("aws default"),
            settings.public_base_url.as_deref().unwrap_or("none")
        );

        Self {
            client,
            public_base_url: settings.public_base_url.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for R2Storage {
    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|e| StorageError::PresignConfig(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(path)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        debug!(bucket = %bucket, path = %path, "Presigned object URL");
        Ok(request.uri().to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> Option<String> {
        self.public_base_url
            .as_deref()
            .map(|base| public_object_url(base, bucket, path))
    }
}

/// Join a public base URL and an object path. A `{bucket}` placeholder in the
/// base is replaced with the bucket name.
#[must_use]
pub fn public_object_url(base: &str, bucket: &str, path: &str) -> String {
    let base = base.replace("{bucket}", bucket);
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_object_url_joins_cleanly() {
        assert_eq!(
            public_object_url("https://cdn.example/", "videos", "/a/b.mp4"),
            "https://cdn.example/a/b.mp4"
        );
        assert_eq!(
            public_object_url("https://cdn.example", "videos", "a.mp4"),
            "https://cdn.example/a.mp4"
        );
    }

    #[test]
    fn test_public_object_url_bucket_placeholder() {
        assert_eq!(
            public_object_url("https://{bucket}.r2.dev", "courses", "videos/x.mp4"),
            "https://courses.r2.dev/videos/x.mp4"
        );
    }

    #[tokio::test]
    async fn test_public_url_absent_without_base() {
        let storage = R2Storage::new(&StorageConfig {
            region: "auto".to_string(),
            ..StorageConfig::default()
        })
        .await;
        assert_eq!(storage.public_url("bucket", "videos/x.mp4"), None);
    }

    #[tokio::test]
    async fn test_presigned_url_is_local_and_signed() -> Result<(), StorageError> {
        let storage = R2Storage::new(&StorageConfig {
            endpoint_url: Some("https://account.r2.cloudflarestorage.com".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI".to_string()),
            region: "auto".to_string(),
            ..StorageConfig::default()
        })
        .await;

        let url = storage
            .signed_url("courses", "videos/learn-vps.mp4", Duration::from_secs(3600))
            .await?;
        assert!(url.starts_with("https://account.r2.cloudflarestorage.com/courses/videos/learn-vps.mp4?"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Expires=3600"));
        Ok(())
    }

    #[tokio::test]
    async fn test_presign_rejects_excessive_ttl() {
        let storage = R2Storage::new(&StorageConfig {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("wJalrXUtnFEMI".to_string()),
            region: "auto".to_string(),
            ..StorageConfig::default()
        })
        .await;

        let result = storage
            .signed_url("courses", "a.mp4", Duration::from_secs(60 * 60 * 24 * 8))
            .await;
        assert!(matches!(result, Err(StorageError::PresignConfig(_))));
    }
}

//! Backup archive download from an S3-compatible store.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use tracing::{debug, info};

use crate::error::{PlatformError, PlatformResult};

pub const ACCESS_KEY_ID_KEY: &str = "ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_KEY: &str = "SECRET_ACCESS_KEY";
pub const BUCKET_NAME_KEY: &str = "BUCKET_NAME";
pub const ENDPOINT_KEY: &str = "ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "s3.amazonaws.com";

/// Region handed to the SDK; S3-compatible stores ignore it.
const DEFAULT_REGION: &str = "us-east-1";

/// Where one backup object lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq)]
pub struct BlobSource {
    /// Endpoint URL including scheme.
    pub endpoint: String,
    pub bucket: String,
    pub key: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for BlobSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobSource")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

impl BlobSource {
    /// Build a source for `key` from the data of a credentials secret.
    ///
    /// The bucket is required; the endpoint defaults to AWS and is assumed
    /// to speak HTTPS when it carries no scheme.
    pub fn from_secret(data: &HashMap<String, String>, key: impl Into<String>) -> PlatformResult<Self> {
        let value = |k: &str| data.get(k).map(|v| v.trim().to_string()).unwrap_or_default();

        let bucket = value(BUCKET_NAME_KEY);
        if bucket.is_empty() {
            return Err(PlatformError::Config(format!("credentials secret has no {BUCKET_NAME_KEY}")));
        }

        let mut endpoint = value(ENDPOINT_KEY);
        if endpoint.is_empty() {
            endpoint = DEFAULT_ENDPOINT.to_string();
        }
        if !endpoint.contains("://") {
            endpoint = format!("https://{endpoint}");
        }

        Ok(Self {
            endpoint,
            bucket,
            key: key.into(),
            access_key_id: value(ACCESS_KEY_ID_KEY),
            secret_access_key: value(SECRET_ACCESS_KEY_KEY),
        })
    }
}

pub type BlobFuture<'a, T> = Pin<Box<dyn Future<Output = PlatformResult<T>> + Send + 'a>>;

/// Fetches backup archives to local disk.
pub trait BlobStore: Send + Sync {
    /// Download `source` into `dest`, returning the number of bytes written.
    fn fetch_object(&self, source: &BlobSource, dest: &Path) -> BlobFuture<'_, u64>;
}

/// [`BlobStore`] backed by the AWS SDK.
#[derive(Debug, Default, Clone)]
pub struct S3BlobStore;

impl S3BlobStore {
    pub fn new() -> Self {
        Self
    }

    async fn client(source: &BlobSource) -> aws_sdk_s3::Client {
        let creds = aws_sdk_s3::config::Credentials::new(
            &source.access_key_id,
            &source.secret_access_key,
            None,
            None,
            "etcd-restore-secret",
        );
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(DEFAULT_REGION))
            .endpoint_url(&source.endpoint)
            .credentials_provider(creds)
            .load()
            .await;
        let conf = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();
        aws_sdk_s3::Client::from_conf(conf)
    }
}

impl BlobStore for S3BlobStore {
    fn fetch_object(&self, source: &BlobSource, dest: &Path) -> BlobFuture<'_, u64> {
        let source = source.clone();
        let dest = dest.to_path_buf();
        Box::pin(async move {
            let client = Self::client(&source).await;
            debug!(endpoint = %source.endpoint, bucket = %source.bucket, key = %source.key, "fetching backup object");

            let resp = client
                .get_object()
                .bucket(&source.bucket)
                .key(&source.key)
                .send()
                .await
                .map_err(|e| {
                    PlatformError::BlobStore(format!(
                        "failed to download {}/{}: {}",
                        source.bucket,
                        source.key,
                        e.into_service_error()
                    ))
                })?;

            let mut reader = resp.body.into_async_read();
            let mut file = tokio::fs::File::create(&dest).await?;
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.sync_all().await?;

            info!(key = %source.key, bytes = written, dest = %dest.display(), "backup object downloaded");
            Ok(written)
        })
    }
}

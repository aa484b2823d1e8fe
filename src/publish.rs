//! Publishing regenerated feeds to object storage.
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use futures::future::BoxFuture;
use secrecy::ExposeSecret;
use thiserror::Error;
use uuid::Uuid;

use crate::config::StorageConfig;

pub const FEED_CONTENT_TYPE: &str = "application/rss+xml";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("S3_BUCKET_NAME environment variable is required to upload the feed")]
    MissingBucket,
    #[error("Failed to upload feed: {0}")]
    Upload(String),
}

/// Stores an RSS document and returns the public URL it can be read from.
pub trait Publisher: Send + Sync {
    fn publish(&self, xml: String) -> BoxFuture<'_, Result<String, PublishError>>;
}

/// Publishes feeds as `{key_prefix}/{uuid}.xml` objects in an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Publisher {
    client: Client,
    bucket: Option<String>,
    region: String,
    key_prefix: String,
    public_base_url: Option<String>,
}

impl S3Publisher {
    /// Builds a client from the storage settings and the AWS SDK defaults.
    ///
    /// A missing bucket is not an error here; the server still starts and
    /// each publish attempt reports it.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let region = config
            .region
            .clone()
            .or_else(|| sdk_config.region().map(|r| r.to_string()))
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).region(Region::new(region.clone()));

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            let creds = Credentials::new(
                key_id.clone(),
                secret.expose_secret().to_string(),
                None,
                None,
                "podcast-feed-editor",
            );
            builder = builder.credentials_provider(creds);
        }

        tracing::info!(
            bucket = config.bucket.as_deref().unwrap_or("<unset>"),
            region = %region,
            custom_endpoint = config.endpoint_url.is_some(),
            "Configured S3 publisher"
        );

        Self::new(Client::from_conf(builder.build()), config, region)
    }

    pub fn new(client: Client, config: &StorageConfig, region: String) -> Self {
        Self {
            client,
            bucket: config.bucket.clone(),
            region,
            key_prefix: config.key_prefix.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    async fn upload(&self, xml: String) -> Result<String, PublishError> {
        let bucket = self.bucket.as_deref().ok_or(PublishError::MissingBucket)?;
        let key = object_key(&self.key_prefix, Uuid::new_v4());

        self.client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .body(ByteStream::from(xml.into_bytes()))
            .content_type(FEED_CONTENT_TYPE)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(bucket, key = %key, error = %DisplayErrorContext(&e), "Upload failed");
                PublishError::Upload(DisplayErrorContext(&e).to_string())
            })?;

        let url = public_url(
            self.public_base_url.as_deref(),
            bucket,
            &self.region,
            &key,
        );
        tracing::info!(url = %url, "Published feed");
        Ok(url)
    }
}

impl Publisher for S3Publisher {
    fn publish(&self, xml: String) -> BoxFuture<'_, Result<String, PublishError>> {
        Box::pin(self.upload(xml))
    }
}

/// `{prefix}/{id}.xml`, or `{id}.xml` when the prefix is empty.
pub fn object_key(prefix: &str, id: Uuid) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{id}.xml")
    } else {
        format!("{prefix}/{id}.xml")
    }
}

/// Public URL of an uploaded object.
///
/// With a configured base the key is appended to it; otherwise the
/// virtual-hosted S3 form `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
pub fn public_url(base: Option<&str>, bucket: &str, region: &str, key: &str) -> String {
    match base {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
    }
}

//! S3 implementation of [`ObjectStore`]

use crate::adapters::object_store::traits::ObjectStore;
use crate::config::schema::S3Config;
use crate::domain::{AggregatorError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, Length};
use secrecy::ExposeSecret;
use tokio::fs::File;

/// S3 (or S3-compatible) bucket
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Wrap an existing client
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from configuration
    ///
    /// Static credentials are used when configured, otherwise the default AWS
    /// credential chain (environment, profile, container or instance role).
    /// A custom endpoint switches to path-style addressing for LocalStack and MinIO.
    pub async fn from_config(config: &S3Config) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let secret: &str = secret.expose_secret().as_ref();
            loader = loader.credentials_provider(Credentials::new(
                access_key_id.clone(),
                secret.to_string(),
                None,
                None,
                "billing-aggregator-config",
            ));
        }

        let shared = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(
            bucket = %config.bucket,
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("default"),
            static_credentials = config.access_key_id.is_some(),
            "S3 client configured"
        );

        Self::new(aws_sdk_s3::Client::from_conf(builder.build()), &config.bucket)
    }

    /// Target bucket
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, body: File, length: u64) -> Result<()> {
        let stream = ByteStream::read_from()
            .file(body)
            .length(Length::Exact(length))
            .build()
            .await
            .map_err(|e| {
                AggregatorError::ObjectStore(format!("Failed to stream {key}: {e}"))
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("text/csv")
            .content_length(length as i64)
            .body(stream)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| {
                AggregatorError::ObjectStore(format!(
                    "PutObject s3://{}/{} failed: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })
    }

    fn location(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use bytes::Bytes;

use super::ObjectStore;

/// Object storage backed by S3 or an S3-compatible endpoint.
///
/// Credentials and region come from the ambient AWS configuration
/// (env vars, profile, instance role).
pub struct S3Store {
    client: aws_sdk_s3::Client,
    region: Option<String>,
}

impl S3Store {
    /// Loads the AWS configuration from the environment. `endpoint_url`
    /// points the client at an S3-compatible service using path-style
    /// addressing.
    pub async fn from_env(endpoint_url: Option<&str>) -> Self {
        let config = aws_config::load_from_env().await;
        let region = config.region().map(|r| r.to_string());

        let mut builder = aws_sdk_s3::config::Builder::from(&config);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }

        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            region,
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Store {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("S3 GetObject failed for 's3://{bucket}/{key}'"))?;

        let body = resp
            .body
            .collect()
            .await
            .with_context(|| format!("failed to read body of 's3://{bucket}/{key}'"))?;
        Ok(body.into_bytes())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("S3 HeadBucket failed for '{bucket}'")),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut req = self.client.create_bucket().bucket(bucket);

        // us-east-1 rejects an explicit location constraint
        if let Some(region) = self.region.as_deref().filter(|r| *r != "us-east-1") {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        req.send()
            .await
            .with_context(|| format!("S3 CreateBucket failed for '{bucket}'"))?;
        Ok(())
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("S3 PutObject failed for 's3://{bucket}/{key}'"))?;
        Ok(())
    }
}

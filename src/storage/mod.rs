//! Bucket/key object storage for the source dataset and the uploaded report.
//!
//! [`ObjectStore`] is the async trait the pipeline talks to.
//! [`S3Store`] implements it on top of `aws-sdk-s3`, [`AzureBlobStore`] on
//! top of `object_store`'s Azure backend. [`LocalStore`] maps buckets to
//! subdirectories of a local root.

mod azure;
mod local;
mod s3;

pub use azure::AzureBlobStore;
pub use local::LocalStore;
pub use s3::S3Store;

use std::io::Write;

use anyhow::Result;
use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::info;

pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";
pub const GZIP_CONTENT_TYPE: &str = "application/gzip";

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes>;

    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    /// Stores `body` at `key`, replacing any existing object.
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()>;
}

/// Creates `bucket` unless it already exists. Returns `true` if it was created.
pub async fn ensure_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<bool> {
    if store.bucket_exists(bucket).await? {
        return Ok(false);
    }
    store.create_bucket(bucket).await?;
    info!(bucket, "Created destination bucket");
    Ok(true)
}

/// Joins an optional directory-style prefix and a file name into an object key.
pub fn object_key(prefix: Option<&str>, file_name: &str) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{}/{}", prefix, file_name),
        None => file_name.to_string(),
    }
}

/// Uploads an encoded report, creating the bucket first if needed.
///
/// With `gzip` the body is compressed and `.gz` is appended to the key.
/// Returns the key the report was stored under.
#[tracing::instrument(skip(store, body), fields(bytes = body.len()))]
pub async fn upload_report(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
    gzip: bool,
) -> Result<String> {
    ensure_bucket(store, bucket).await?;

    let (body, key, content_type) = if gzip {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body)?;
        (encoder.finish()?, format!("{}.gz", key), GZIP_CONTENT_TYPE)
    } else {
        (body, key.to_string(), CSV_CONTENT_TYPE)
    };

    store.put(bucket, &key, Bytes::from(body), content_type).await?;
    info!(bucket, key = %key, "Report uploaded");
    Ok(key)
}

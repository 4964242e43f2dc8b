//! Loading the raw dataset from a local file, an HTTP URL or object storage.

mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::storage::ObjectStore;

/// Object storage service named by a source URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    S3,
    Azure,
}

impl Provider {
    pub fn scheme(self) -> &'static str {
        match self {
            Provider::S3 => "s3",
            Provider::Azure => "az",
        }
    }
}

/// Where the raw dataset lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `s3://bucket/key` or `az://container/blob`
    Object {
        provider: Provider,
        bucket: String,
        key: String,
    },
    /// `http://` or `https://` URL, e.g. a pre-signed link.
    Url(String),
    Path(String),
}

impl Source {
    pub fn parse(raw: &str) -> Result<Self> {
        for provider in [Provider::S3, Provider::Azure] {
            let scheme = provider.scheme();
            let Some(rest) = raw
                .strip_prefix(scheme)
                .and_then(|r| r.strip_prefix("://"))
            else {
                continue;
            };

            match rest.split_once('/') {
                Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                    return Ok(Source::Object {
                        provider,
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    });
                }
                _ => bail!("object source '{}' must look like {}://bucket/key", raw, scheme),
            }
        }

        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Source::Url(raw.to_string()));
        }

        Ok(Source::Path(raw.to_string()))
    }

    /// The object storage service this source is read from, if any.
    pub fn provider(&self) -> Option<Provider> {
        match self {
            Source::Object { provider, .. } => Some(*provider),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Object {
                provider,
                bucket,
                key,
            } => write!(f, "{}://{}/{}", provider.scheme(), bucket, key),
            Source::Url(url) => f.write_str(url),
            Source::Path(path) => f.write_str(path),
        }
    }
}

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    let status = resp.status();
    if !status.is_success() {
        bail!("GET {} returned status {}", url, status);
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Reads the dataset bytes for `source`.
///
/// `store` is only consulted for [`Source::Object`] and must be a backend
/// for the source's [`Provider`].
#[tracing::instrument(skip(client, store), fields(source = %source))]
pub async fn load_source<C: HttpClient>(
    source: &Source,
    client: &C,
    store: &dyn ObjectStore,
) -> Result<Vec<u8>> {
    let bytes = match source {
        Source::Object { bucket, key, .. } => store.get(bucket, key).await?.to_vec(),
        Source::Url(url) => fetch_bytes(client, url).await?,
        Source::Path(path) => tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read dataset '{}'", path))?,
    };
    debug!(bytes = bytes.len(), "Dataset bytes loaded");
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::MemoryStore;
    use bytes::Bytes;
    use std::env;

    #[test]
    fn test_parse_sources() {
        assert_eq!(
            Source::parse("s3://raw/tourism/data.csv").unwrap(),
            Source::Object {
                provider: Provider::S3,
                bucket: "raw".into(),
                key: "tourism/data.csv".into()
            }
        );
        assert_eq!(
            Source::parse("az://tourism/raw/data.csv").unwrap(),
            Source::Object {
                provider: Provider::Azure,
                bucket: "tourism".into(),
                key: "raw/data.csv".into()
            }
        );
        assert_eq!(
            Source::parse("https://example.com/data.csv").unwrap(),
            Source::Url("https://example.com/data.csv".into())
        );
        assert_eq!(
            Source::parse("data/tourism.csv").unwrap(),
            Source::Path("data/tourism.csv".into())
        );
    }

    #[test]
    fn test_parse_rejects_incomplete_object_uri() {
        assert!(Source::parse("s3://bucket-only").is_err());
        assert!(Source::parse("s3://bucket/").is_err());
        assert!(Source::parse("s3:///key").is_err());
        assert!(Source::parse("az://container").is_err());
    }

    #[test]
    fn test_provider() {
        assert_eq!(Source::parse("az://c/b.csv").unwrap().provider(), Some(Provider::Azure));
        assert_eq!(Source::parse("s3://b/k.csv").unwrap().provider(), Some(Provider::S3));
        assert_eq!(Source::parse("data.csv").unwrap().provider(), None);
    }

    #[test]
    fn test_display_round_trips() {
        for raw in ["s3://raw/data.csv", "az://tourism/raw/data.csv"] {
            assert_eq!(Source::parse(raw).unwrap().to_string(), raw);
        }
    }

    #[tokio::test]
    async fn test_load_from_store_and_path() {
        let store = MemoryStore::default();
        store
            .put("raw", "data.csv", Bytes::from("Country\n"), "text/csv")
            .await
            .unwrap();
        let client = BasicClient::new().unwrap();

        let source = Source::parse("s3://raw/data.csv").unwrap();
        let bytes = load_source(&source, &client, &store).await.unwrap();
        assert_eq!(bytes, b"Country\n");

        let path = env::temp_dir().join("rating_report_test_source.csv");
        std::fs::write(&path, b"Rating\n").unwrap();
        let source = Source::Path(path.display().to_string());
        let bytes = load_source(&source, &client, &store).await.unwrap();
        assert_eq!(bytes, b"Rating\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_path_is_error() {
        let store = MemoryStore::default();
        let client = BasicClient::new().unwrap();
        let source = Source::Path("/definitely/not/here.csv".into());
        assert!(load_source(&source, &client, &store).await.is_err());
    }
}

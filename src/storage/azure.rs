use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use bytes::Bytes;
use object_store::azure::{AzureCredential, MicrosoftAzure, MicrosoftAzureBuilder};
use object_store::path::Path;
use object_store::{Attribute, Attributes, CredentialProvider, ObjectStore as _, PutOptions, PutPayload};
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::ObjectStore;

const BLOB_API_VERSION: &str = "2021-08-06";

/// Azure Blob Storage: buckets are containers of one storage account.
///
/// Blob reads and writes go through `object_store`. Credentials come from
/// the `AZURE_*` variables read by [`MicrosoftAzureBuilder::from_env`].
pub struct AzureBlobStore {
    account: String,
    builder: MicrosoftAzureBuilder,
    http: reqwest::Client,
    containers: Mutex<HashMap<String, Arc<MicrosoftAzure>>>,
}

impl AzureBlobStore {
    pub fn from_env(account: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            account: account.to_string(),
            builder: MicrosoftAzureBuilder::from_env().with_account(account),
            http,
            containers: Mutex::new(HashMap::new()),
        })
    }

    fn container(&self, container: &str) -> Result<Arc<MicrosoftAzure>> {
        let mut containers = self
            .containers
            .lock()
            .map_err(|_| anyhow!("container cache lock poisoned"))?;

        if let Some(store) = containers.get(container) {
            return Ok(store.clone());
        }

        let store = self
            .builder
            .clone()
            .with_container_name(container)
            .build()
            .with_context(|| format!("failed to configure container '{}'", container))?;
        let store = Arc::new(store);
        containers.insert(container.to_string(), store.clone());
        Ok(store)
    }

    fn container_url(&self, container: &str) -> String {
        format!(
            "https://{}.blob.core.windows.net/{}?restype=container",
            self.account, container
        )
    }

    /// Sends a container-level request authorized with the store's credential.
    async fn container_request(&self, method: Method, container: &str) -> Result<StatusCode> {
        let credential = self
            .container(container)?
            .credentials()
            .get_credential()
            .await
            .context("failed to obtain Azure storage credential")?;

        let request = self
            .http
            .request(method, self.container_url(container))
            .header("x-ms-version", BLOB_API_VERSION);
        let request = match credential.as_ref() {
            AzureCredential::BearerToken(token) => request.bearer_auth(token),
            AzureCredential::SASToken(pairs) => request.query(pairs),
            _ => bail!("container management needs a service principal, managed identity or SAS token"),
        };

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send container request: {}", e))?;
        Ok(response.status())
    }
}

fn container_exists(container: &str, status: StatusCode) -> Result<bool> {
    match status {
        s if s.is_success() => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        s => bail!("checking container '{}' returned status {}", container, s),
    }
}

/// A container that already exists counts as created.
fn container_created(container: &str, status: StatusCode) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::CONFLICT => {
            debug!(container, "Container already exists");
            Ok(())
        }
        s => bail!("creating container '{}' returned status {}", container, s),
    }
}

#[async_trait::async_trait]
impl ObjectStore for AzureBlobStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let store = self.container(bucket)?;
        let location = Path::from(key);
        let result = store
            .get(&location)
            .await
            .with_context(|| format!("Azure GetBlob failed for 'az://{bucket}/{key}'"))?;

        result
            .bytes()
            .await
            .with_context(|| format!("failed to read body of 'az://{bucket}/{key}'"))
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let status = self.container_request(Method::GET, bucket).await?;
        container_exists(bucket, status)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let status = self.container_request(Method::PUT, bucket).await?;
        container_created(bucket, status)
    }

    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let store = self.container(bucket)?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        store
            .put_opts(&Path::from(key), PutPayload::from(body), options)
            .await
            .with_context(|| format!("Azure PutBlob failed for 'az://{bucket}/{key}'"))?;
        Ok(())
    }
}

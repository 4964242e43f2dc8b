use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use rating_report::network::{AccessTarget, NetworkApi, NetworkRuleSet, Subnet};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::documents::{rules_patch_body, rules_from_account, subnet_from_document, subnet_update_body};

const MANAGEMENT_URL: &str = "https://management.azure.com";
const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";
const NETWORK_API_VERSION: &str = "2023-09-01";
const STORAGE_API_VERSION: &str = "2023-01-01";
const ASYNC_OPERATION: &str = "azure-asyncoperation";
const POLL_ATTEMPTS: u32 = 60;
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Service principal used for the client-credentials token exchange.
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct OperationStatus {
    status: String,
}

pub struct ArmClient {
    base_url: String,
    access_token: String,
    http: reqwest::Client,
}

impl ArmClient {
    pub async fn new(credentials: &Credentials) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let access_token = Self::exchange_token(&http, credentials).await?;

        Ok(Self {
            base_url: MANAGEMENT_URL.to_string(),
            access_token,
            http,
        })
    }

    async fn exchange_token(http: &reqwest::Client, credentials: &Credentials) -> Result<String> {
        let url = format!(
            "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
            credentials.tenant_id
        );

        let response = http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("scope", MANAGEMENT_SCOPE),
            ])
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send token request: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Token exchange failed with status {}: {}", status, body));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse token response: {}", e))?;

        Ok(token_response.access_token)
    }

    fn subnet_url(&self, target: &AccessTarget) -> String {
        format!(
            "{}{}?api-version={}",
            self.base_url,
            target.subnet_id(),
            NETWORK_API_VERSION
        )
    }

    fn storage_account_url(&self, target: &AccessTarget) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Storage/storageAccounts/{}?api-version={}",
            self.base_url,
            target.subscription_id,
            target.resource_group,
            target.storage_account,
            STORAGE_API_VERSION
        )
    }

    /// Sends `request` with the bearer token and returns the headers and JSON
    /// body of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(HeaderMap, Value)> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to send request: {}", e))?;

        let status = response.status();
        let headers = response.headers().clone();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("API returned status {}: {}", status, body));
        }

        let text = response.text().await?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| anyhow!("Failed to parse response: {}", e))?
        };
        Ok((headers, body))
    }

    /// Polls an `Azure-AsyncOperation` URL until the operation finishes.
    async fn wait_for_operation(&self, operation_url: &str, retry_after: Duration) -> Result<()> {
        for attempt in 1..=POLL_ATTEMPTS {
            tokio::time::sleep(retry_after).await;

            let (_, body) = self.send(self.http.get(operation_url)).await?;
            let status: OperationStatus = serde_json::from_value(body)?;
            debug!(attempt, status = %status.status, "Long-running operation status");

            match status.status.as_str() {
                "Succeeded" => return Ok(()),
                "Failed" | "Canceled" => bail!("operation ended with status {}", status.status),
                _ => continue,
            }
        }
        bail!("operation did not finish after {} polls", POLL_ATTEMPTS)
    }
}

fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(POLL_INTERVAL)
}

#[async_trait]
impl NetworkApi for ArmClient {
    async fn get_subnet(&self, target: &AccessTarget) -> Result<Subnet> {
        let (_, body) = self.send(self.http.get(self.subnet_url(target))).await?;
        subnet_from_document(body)
    }

    async fn update_subnet(&self, target: &AccessTarget, subnet: &Subnet) -> Result<()> {
        let body = subnet_update_body(subnet)?;
        let (headers, _) = self
            .send(self.http.put(self.subnet_url(target)).json(&body))
            .await?;

        if let Some(operation) = headers.get(ASYNC_OPERATION).and_then(|v| v.to_str().ok()) {
            info!(subnet = %target.subnet, "Waiting for subnet update to complete");
            self.wait_for_operation(operation, retry_after(&headers)).await?;
        }
        Ok(())
    }

    async fn get_network_rules(&self, target: &AccessTarget) -> Result<Option<NetworkRuleSet>> {
        let (_, body) = self
            .send(self.http.get(self.storage_account_url(target)))
            .await?;
        rules_from_account(&body)
    }

    async fn update_network_rules(&self, target: &AccessTarget, rules: &NetworkRuleSet) -> Result<()> {
        let body = rules_patch_body(rules)?;
        self.send(self.http.patch(self.storage_account_url(target)).json(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_defaults() {
        assert_eq!(retry_after(&HeaderMap::new()), POLL_INTERVAL);

        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(retry_after(&headers), Duration::from_secs(2));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), POLL_INTERVAL);
    }
}

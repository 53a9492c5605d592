use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::model::{DeviceRecord, NestedRef, SecretsGroup, VirtualChassisRecord};
use super::source::InventorySource;
use crate::config::NautobotConfig;

/// GraphQL selection for a secrets-group and everything needed to resolve it
pub const SECRETS_GROUP_QUERY: &str = r#"
query ($secrets_group_id: ID) {
    secrets_group(id: $secrets_group_id) {
        id
        name
        slug
        secretsgroupassociation_set {
            access_type
            secret_type
            secret {
                id
                provider
                name
                slug
                parameters
                description
            }
        }
    }
}
"#;

/// Nautobot REST and GraphQL client
#[derive(Clone)]
pub struct NautobotClient {
    client: Client,
    endpoint: String,
    token: String,
    api_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SecretsGroupData {
    secrets_group: Option<SecretsGroup>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
}

impl NautobotClient {
    /// Create a new Nautobot client
    pub fn new(config: &NautobotConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            api_version: config.api_version.clone(),
        })
    }

    pub(crate) fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let accept = match &self.api_version {
            Some(version) => format!("application/json; version={}", version),
            None => "application/json".to_string(),
        };
        request
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", accept)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.api_url(path);
        debug!("Querying Nautobot: {}", url);

        let response = self
            .authorized(self.client.get(&url))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Failed to query Nautobot at {}", url))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Nautobot request failed with status {}: {}", status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse Nautobot response from {}", url))
    }

    /// Execute a GraphQL query and return its `data` member
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let url = self.api_url("graphql/");
        debug!("Running GraphQL query against: {}", url);

        let response = self
            .authorized(self.client.post(&url))
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .context("Failed to send GraphQL query to Nautobot")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GraphQL query failed with status {}: {}", status, body);
        }

        let parsed: GraphQlResponse<T> = response
            .json()
            .await
            .context("Failed to parse GraphQL response")?;

        if !parsed.errors.is_empty() {
            let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
            anyhow::bail!("GraphQL query returned errors: {}", messages.join("; "));
        }

        parsed
            .data
            .ok_or_else(|| anyhow::anyhow!("GraphQL response contained no data"))
    }
}

#[async_trait::async_trait]
impl InventorySource for NautobotClient {
    async fn secrets_group(&self, group_id: &str) -> Result<Option<SecretsGroup>> {
        let data: SecretsGroupData = self
            .graphql(SECRETS_GROUP_QUERY, json!({ "secrets_group_id": group_id }))
            .await?;
        Ok(data.secrets_group)
    }

    async fn device_by_name(&self, name: &str) -> Result<Option<DeviceRecord>> {
        let page: Page<DeviceRecord> = self.get_json("dcim/devices/", &[("name", name)]).await?;

        let mut devices = page.results.into_iter();
        let device = devices.next();
        if devices.next().is_some() {
            anyhow::bail!("More than one device is named '{}'", name);
        }
        Ok(device)
    }

    async fn virtual_chassis_master(&self, chassis: &NestedRef) -> Result<Option<DeviceRecord>> {
        let record: VirtualChassisRecord = self
            .get_json(&format!("dcim/virtual-chassis/{}/", chassis.id), &[])
            .await?;

        let Some(master) = record.master else {
            return Ok(None);
        };

        let device = self
            .get_json(&format!("dcim/devices/{}/", master.id), &[])
            .await?;
        Ok(Some(device))
    }

    fn source_type(&self) -> &'static str {
        "Nautobot"
    }
}

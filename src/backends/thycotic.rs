use reqwest::{Certificate, Client};
use serde::Deserialize;
use std::fs;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::authorizer::Authorizer;
use super::backend_error_message;
use super::secret_backend::{Secret, SecretBackend, SecretField, SecretLocator};
use crate::cache::SlotCache;
use crate::config::SecretServerConfig;
use crate::error::{Result, SecretsError};

/// Thycotic/Delinea Secret Server client
///
/// Remembers the most recently fetched secret together with the locator that
/// produced it. Asking for the same locator again is answered from memory;
/// any other locator replaces the entry.
pub struct ThycoticClient {
    config: SecretServerConfig,
    cache: SlotCache<SecretLocator, Secret>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSecretResponse {
    id: i64,
    name: String,
    #[serde(default)]
    folder_id: Option<i64>,
    #[serde(default)]
    items: Vec<ServerSecretItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSecretItem {
    #[serde(default)]
    field_name: String,
    slug: String,
    #[serde(default)]
    item_value: Option<String>,
    #[serde(default)]
    is_file: bool,
    #[serde(default)]
    is_password: bool,
}

impl From<ServerSecretResponse> for Secret {
    fn from(response: ServerSecretResponse) -> Self {
        let fields = response
            .items
            .into_iter()
            .map(|item| {
                (
                    item.slug.clone(),
                    SecretField {
                        field_name: item.field_name,
                        slug: item.slug,
                        value: item.item_value.unwrap_or_default(),
                        is_file: item.is_file,
                        is_password: item.is_password,
                    },
                )
            })
            .collect();

        Secret {
            id: response.id,
            name: response.name,
            folder_id: response.folder_id,
            fields,
        }
    }
}

impl ThycoticClient {
    pub fn new(config: SecretServerConfig) -> Self {
        Self {
            config,
            cache: SlotCache::new(),
        }
    }

    pub fn config(&self) -> &SecretServerConfig {
        &self.config
    }

    /// The currently loaded secret
    pub fn secret(&self) -> Option<&Secret> {
        self.cache.value()
    }

    /// The locator the currently loaded secret was fetched with
    pub fn locator(&self) -> Option<&SecretLocator> {
        self.cache.key()
    }

    /// Root URL of the Secret Server instance, derived from the tenant in
    /// cloud mode.
    pub fn server_url(&self) -> Result<String> {
        if self.config.cloud_based {
            let tenant = self
                .config
                .tenant
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    SecretsError::Configuration(
                        "SECRET_SERVER_TENANT is required for cloud based Secret Server".to_string(),
                    )
                })?;
            Ok(format!(
                "https://{}.secretservercloud.{}",
                tenant, self.config.tld
            ))
        } else if self.config.base_url.trim().is_empty() {
            Err(SecretsError::Configuration(
                "SECRET_SERVER_BASE_URL is not set".to_string(),
            ))
        } else {
            Ok(self.config.base_url.trim_end_matches('/').to_string())
        }
    }

    /// Build the HTTP client. A configured certificate bundle replaces the
    /// system roots.
    fn http_client(&self) -> Result<Client> {
        let mut builder =
            Client::builder().timeout(Duration::from_secs(self.config.timeout_seconds));

        if let Some(path) = &self.config.ca_bundle_path {
            if !path.exists() {
                return Err(SecretsError::Configuration(format!(
                    "Trusted certificates file not found: {}",
                    path.display()
                )));
            }
            let pem = fs::read(path).map_err(|e| {
                SecretsError::Configuration(format!(
                    "Failed to read trusted certificates file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            let certificates = Certificate::from_pem_bundle(&pem).map_err(|e| {
                SecretsError::Configuration(format!(
                    "Invalid trusted certificates file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            if certificates.is_empty() {
                return Err(SecretsError::Configuration(format!(
                    "No certificates found in trusted certificates file {}",
                    path.display()
                )));
            }
            debug!(
                "Trusting {} certificate(s) from {}",
                certificates.len(),
                path.display()
            );
            builder = builder.tls_built_in_root_certs(false);
            for certificate in certificates {
                builder = builder.add_root_certificate(certificate);
            }
        }

        builder
            .build()
            .map_err(|e| SecretsError::Configuration(format!("Failed to create HTTP client: {}", e)))
    }

    /// Fetch a secret by id or path.
    ///
    /// Configuration problems are reported before any request is sent. A
    /// failed request clears the loaded secret.
    pub async fn fetch(&mut self, locator: &SecretLocator) -> Result<&Secret> {
        if self.cache.get(locator).is_some() {
            debug!("Secret Server cache hit for {}", locator);
        } else {
            let authorizer = Authorizer::select(&self.config)?;
            let base_url = self.server_url()?;
            let client = self.http_client()?;

            info!(
                "Reading secret ({}) from Secret Server using {}",
                locator,
                authorizer.kind()
            );
            match request_secret(&client, &base_url, &authorizer, locator).await {
                Ok(secret) => {
                    self.cache.put(locator.clone(), secret);
                }
                Err(e) => {
                    warn!("Failed to read secret ({}): {}", locator, e);
                    self.cache.clear();
                    return Err(e);
                }
            }
        }

        self.cache.value().ok_or(SecretsError::NoSecretLoaded)
    }

    /// Value of a field on the currently loaded secret
    pub fn field(&self, field_name: &str) -> Result<&str> {
        self.cache
            .value()
            .ok_or(SecretsError::NoSecretLoaded)?
            .field(field_name)
    }
}

pub(crate) fn secret_url(base_url: &str, locator: &SecretLocator) -> String {
    // Path lookups go through the placeholder id 0.
    let id = locator.id().unwrap_or("0");
    format!("{}/api/v1/secrets/{}", base_url.trim_end_matches('/'), id)
}

async fn request_secret(
    client: &Client,
    base_url: &str,
    authorizer: &Authorizer,
    locator: &SecretLocator,
) -> Result<Secret> {
    let token = authorizer.access_token(client, base_url).await?;

    let url = secret_url(base_url, locator);
    debug!("Requesting secret from: {}", url);

    let mut request = client.get(&url).bearer_auth(token);
    if let Some(path) = locator.path() {
        request = request.query(&[("secretPath", path)]);
    }

    let response = request.send().await?;
    if !response.status().is_success() {
        return Err(SecretsError::Backend(backend_error_message(response).await));
    }

    let secret: ServerSecretResponse = response.json().await?;
    Ok(secret.into())
}

#[async_trait::async_trait]
impl SecretBackend for ThycoticClient {
    async fn read_secret(&mut self, locator: &SecretLocator) -> Result<Secret> {
        self.fetch(locator).await.cloned()
    }

    fn backend_type(&self) -> &'static str {
        "Thycotic Secret Server"
    }
}

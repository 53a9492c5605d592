//! Credential resolution
//!
//! Turns the secret associations of a secrets-group into flat credential
//! records, fetching each value from the backend that owns its provider tag.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, error, info};

use crate::backends::{Backend, Secret, SecretLocator, ThycoticClient};
use crate::cache::SlotCache;
use crate::config::{Config, SecretServerConfig};
use crate::error::{Result, SecretsError};
use crate::inventory::{
    InventoryGateway, NautobotClient, SecretAssociation, SecretParameters, SecretsGroup,
};

/// Provider tags served by the Thycotic Secret Server backend
pub const THYCOTIC_PROVIDERS: [&str; 2] = ["thycotic-tss-id", "thycotic-tss-path"];

/// One resolved credential of a secrets-group
///
/// `value` is empty when the secret could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedCredential {
    pub access_type: String,
    pub secret_type: String,
    pub secret_name: String,
    pub secret_slug: String,
    pub secret_id: String,
    pub secret_provider: String,
    pub secret_description: String,
    pub value: String,
}

impl ResolvedCredential {
    fn from_association(association: &SecretAssociation) -> Self {
        let secret = &association.secret;
        Self {
            access_type: association.access_type.clone(),
            secret_type: association.secret_type.clone(),
            secret_name: secret.name.clone(),
            secret_slug: secret.slug.clone(),
            secret_id: secret.id.clone(),
            secret_provider: secret.provider.clone(),
            secret_description: secret.description.clone(),
            value: String::new(),
        }
    }
}

/// Maps provider tags to the backends that serve them
///
/// Several tags may share one backend, and with it that backend's cache.
#[derive(Default)]
pub struct ProviderRegistry {
    backends: Vec<Backend>,
    tags: HashMap<String, usize>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry serving the Thycotic provider tags from one client
    pub fn with_thycotic(config: SecretServerConfig) -> Self {
        let mut registry = Self::new();
        registry.register(&THYCOTIC_PROVIDERS, Box::new(ThycoticClient::new(config)));
        registry
    }

    /// Route `tags` to `backend`, replacing any earlier route for those tags
    pub fn register(&mut self, tags: &[&str], backend: Backend) -> &mut Self {
        let slot = self.backends.len();
        self.backends.push(backend);
        for tag in tags {
            self.tags.insert(tag.to_string(), slot);
        }
        self
    }

    pub fn supports(&self, provider: &str) -> bool {
        self.tags.contains_key(provider)
    }

    fn slot(&self, provider: &str) -> Result<usize> {
        self.tags
            .get(provider)
            .copied()
            .ok_or_else(|| SecretsError::UnsupportedProvider(provider.to_string()))
    }
}

/// Resolves device and secrets-group credentials
///
/// Keeps the last secret read from any backend, so associations that pick
/// different fields of one secret cost a single backend read.
pub struct CredentialResolver {
    inventory: InventoryGateway,
    providers: ProviderRegistry,
    cache: SlotCache<(usize, SecretLocator), Secret>,
}

impl CredentialResolver {
    pub fn new(inventory: InventoryGateway, providers: ProviderRegistry) -> Self {
        Self {
            inventory,
            providers,
            cache: SlotCache::new(),
        }
    }

    /// Resolver backed by Nautobot and Thycotic Secret Server
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let nautobot =
            NautobotClient::new(&config.nautobot).context("Failed to create Nautobot client")?;

        Ok(Self::new(
            InventoryGateway::new(Box::new(nautobot)),
            ProviderRegistry::with_thycotic(config.secret_server.clone()),
        ))
    }

    /// Read the field named by `secret_selected_value` from the secret the
    /// parameters point at.
    ///
    /// Failures confined to this one credential are logged and yield an empty
    /// value. Unsupported providers and configuration errors are returned.
    pub async fn resolve_backend_secret_field(
        &mut self,
        provider: &str,
        parameters: &SecretParameters,
    ) -> Result<String> {
        let slot = self.providers.slot(provider)?;

        match self.read_field(slot, parameters).await {
            Ok(value) => Ok(value),
            Err(e) if e.is_credential_scoped() => {
                error!(
                    "Failed to read {} secret (Id: {}, Path: {}): {}",
                    self.providers.backends[slot].backend_type(),
                    parameters.secret_id.as_deref().unwrap_or("None"),
                    parameters.secret_path.as_deref().unwrap_or("None"),
                    e
                );
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }

    async fn read_field(&mut self, slot: usize, parameters: &SecretParameters) -> Result<String> {
        let locator = SecretLocator::from_parameters(parameters)?;
        let selected = parameters
            .secret_selected_value
            .as_deref()
            .ok_or(SecretsError::MissingParameter("secret_selected_value"))?;

        let key = (slot, locator);
        if self.cache.get(&key).is_none() {
            let secret = self.providers.backends[slot].read_secret(&key.1).await?;
            self.cache.put(key.clone(), secret);
        } else {
            debug!("Reusing cached secret ({})", key.1);
        }

        let secret = self.cache.get(&key).ok_or(SecretsError::NoSecretLoaded)?;
        secret.field(selected).map(str::to_string)
    }

    /// Resolve every association of a secrets-group, in order
    ///
    /// Every provider tag is checked before any backend is contacted, so an
    /// unsupported provider fails the call without partial results.
    pub async fn expand_associations(
        &mut self,
        group: Option<&SecretsGroup>,
    ) -> Result<Vec<ResolvedCredential>> {
        let Some(associations) = group.and_then(|g| g.associations.as_deref()) else {
            return Ok(Vec::new());
        };

        if let Some(unsupported) = associations
            .iter()
            .find(|a| !self.providers.supports(&a.secret.provider))
        {
            return Err(SecretsError::UnsupportedProvider(
                unsupported.secret.provider.clone(),
            ));
        }

        let mut credentials = Vec::with_capacity(associations.len());
        for association in associations {
            let mut credential = ResolvedCredential::from_association(association);
            credential.value = self
                .resolve_backend_secret_field(
                    &association.secret.provider,
                    &association.secret.parameters,
                )
                .await?;
            credentials.push(credential);
        }

        Ok(credentials)
    }

    /// Credentials of the secrets-group assigned to a device
    pub async fn credentials_for_device(
        &mut self,
        device_name: &str,
    ) -> Result<Vec<ResolvedCredential>> {
        let group = self.inventory.group_info_from_device(device_name).await;
        if group.is_none() {
            info!("No credentials found for device {}", device_name);
        }
        self.expand_associations(group.as_ref()).await
    }

    /// Credentials of a secrets-group by id
    pub async fn credentials_for_group_id(
        &mut self,
        group_id: &str,
    ) -> Result<Vec<ResolvedCredential>> {
        let group = self.inventory.group_info_by_id(group_id).await;
        self.expand_associations(group.as_ref()).await
    }
}

/// Map lower-cased secret type to value for one access type
///
/// The access type is matched case-insensitively. When a secret type repeats,
/// the later credential wins.
pub fn filter_by_access_type(
    credentials: &[ResolvedCredential],
    access_type: &str,
) -> BTreeMap<String, String> {
    credentials
        .iter()
        .filter(|c| c.access_type.eq_ignore_ascii_case(access_type))
        .map(|c| (c.secret_type.to_lowercase(), c.value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SecretBackend;
    use crate::inventory::test_support::{device, group, StubInventory};
    use crate::inventory::SecretDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Backend serving fixed secrets and counting reads
    struct StubBackend {
        secrets: HashMap<SecretLocator, Secret>,
        reads: Arc<AtomicUsize>,
        misconfigured: bool,
    }

    impl StubBackend {
        fn new(reads: Arc<AtomicUsize>) -> Self {
            let mut secrets = HashMap::new();
            secrets.insert(
                SecretLocator::Id("42".into()),
                Secret::new(42, "Core Switches", [("username", "admin"), ("password", "p@ss")]),
            );
            secrets.insert(
                SecretLocator::Path("\\Network\\Edge".into()),
                Secret::new(43, "Edge Routers", [("username", "edge"), ("password", "r0uter")]),
            );
            Self {
                secrets,
                reads,
                misconfigured: false,
            }
        }
    }

    #[async_trait::async_trait]
    impl SecretBackend for StubBackend {
        async fn read_secret(&mut self, locator: &SecretLocator) -> Result<Secret> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.misconfigured {
                return Err(SecretsError::Configuration("no credentials".into()));
            }
            self.secrets
                .get(locator)
                .cloned()
                .ok_or_else(|| SecretsError::Backend(format!("Secret {} not found", locator)))
        }

        fn backend_type(&self) -> &'static str {
            "stub"
        }
    }

    fn by_id(id: &str, field: &str) -> SecretParameters {
        SecretParameters {
            secret_id: Some(id.to_string()),
            secret_selected_value: Some(field.to_string()),
            ..SecretParameters::default()
        }
    }

    fn by_path(path: &str, field: &str) -> SecretParameters {
        SecretParameters {
            secret_path: Some(path.to_string()),
            secret_selected_value: Some(field.to_string()),
            ..SecretParameters::default()
        }
    }

    fn association(
        access_type: &str,
        secret_type: &str,
        provider: &str,
        parameters: SecretParameters,
    ) -> SecretAssociation {
        let slug = format!("{}-{}", access_type, secret_type).to_lowercase();
        SecretAssociation {
            access_type: access_type.to_string(),
            secret_type: secret_type.to_string(),
            secret: SecretDescriptor {
                id: format!("uuid-{}", slug),
                provider: provider.to_string(),
                name: slug.clone(),
                slug,
                description: String::new(),
                parameters,
            },
        }
    }

    fn resolver_with(stub: StubInventory, backend: StubBackend) -> CredentialResolver {
        let mut providers = ProviderRegistry::new();
        providers.register(&THYCOTIC_PROVIDERS, Box::new(backend));
        CredentialResolver::new(InventoryGateway::new(Box::new(stub)), providers)
    }

    fn resolver(reads: &Arc<AtomicUsize>) -> CredentialResolver {
        resolver_with(StubInventory::default(), StubBackend::new(reads.clone()))
    }

    fn credential(access_type: &str, secret_type: &str, value: &str) -> ResolvedCredential {
        ResolvedCredential {
            access_type: access_type.to_string(),
            secret_type: secret_type.to_string(),
            secret_name: String::new(),
            secret_slug: String::new(),
            secret_id: String::new(),
            secret_provider: "thycotic-tss-id".to_string(),
            secret_description: String::new(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_same_locator_reads_backend_once() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let username = resolver
            .resolve_backend_secret_field("thycotic-tss-id", &by_id("42", "username"))
            .await
            .unwrap();
        let password = resolver
            .resolve_backend_secret_field("thycotic-tss-id", &by_id("42", "password"))
            .await
            .unwrap();

        assert_eq!(username, "admin");
        assert_eq!(password, "p@ss");
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_locators_read_backend_each_time() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        resolver
            .resolve_backend_secret_field("thycotic-tss-id", &by_id("42", "username"))
            .await
            .unwrap();
        let value = resolver
            .resolve_backend_secret_field("thycotic-tss-path", &by_path("\\Network\\Edge", "password"))
            .await
            .unwrap();

        assert_eq!(value, "r0uter");
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(
            resolver.cache.key().map(|(_, locator)| locator.clone()),
            Some(SecretLocator::Path("\\Network\\Edge".into()))
        );

        // The first secret was evicted, so going back costs another read.
        resolver
            .resolve_backend_secret_field("thycotic-tss-id", &by_id("42", "password"))
            .await
            .unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_id_takes_precedence_over_path() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let parameters = SecretParameters {
            secret_path: Some("\\Network\\Edge".to_string()),
            ..by_id("42", "username")
        };
        let value = resolver
            .resolve_backend_secret_field("thycotic-tss-id", &parameters)
            .await
            .unwrap();

        assert_eq!(value, "admin");
    }

    #[tokio::test]
    async fn test_missing_field_yields_empty_value() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let value = resolver
            .resolve_backend_secret_field("thycotic-tss-id", &by_id("42", "enable"))
            .await
            .unwrap();
        assert_eq!(value, "");
    }

    #[tokio::test]
    async fn test_backend_error_yields_empty_value() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let value = resolver
            .resolve_backend_secret_field("thycotic-tss-id", &by_id("999", "password"))
            .await
            .unwrap();
        assert_eq!(value, "");
    }

    #[tokio::test]
    async fn test_missing_locator_yields_empty_value() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let parameters = SecretParameters {
            secret_selected_value: Some("password".to_string()),
            ..SecretParameters::default()
        };
        let value = resolver
            .resolve_backend_secret_field("thycotic-tss-id", &parameters)
            .await
            .unwrap();

        assert_eq!(value, "");
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_configuration_error_propagates() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut backend = StubBackend::new(reads.clone());
        backend.misconfigured = true;
        let mut resolver = resolver_with(StubInventory::default(), backend);

        let err = resolver
            .resolve_backend_secret_field("thycotic-tss-id", &by_id("42", "password"))
            .await
            .unwrap_err();
        assert!(matches!(err, SecretsError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_expand_preserves_order_and_count() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let group = group(
            "g1",
            vec![
                association("GENERIC", "USERNAME", "thycotic-tss-id", by_id("42", "username")),
                association("GENERIC", "PASSWORD", "thycotic-tss-id", by_id("42", "password")),
                association("SSH", "PASSWORD", "thycotic-tss-path", by_path("\\Network\\Edge", "password")),
            ],
        );
        let credentials = resolver.expand_associations(Some(&group)).await.unwrap();

        let summary: Vec<(&str, &str, &str)> = credentials
            .iter()
            .map(|c| (c.access_type.as_str(), c.secret_type.as_str(), c.value.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("GENERIC", "USERNAME", "admin"),
                ("GENERIC", "PASSWORD", "p@ss"),
                ("SSH", "PASSWORD", "r0uter"),
            ]
        );
        assert_eq!(credentials[2].secret_provider, "thycotic-tss-path");
        assert_eq!(credentials[0].secret_id, "uuid-generic-username");
        assert_eq!(reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_expand_isolates_failing_credential() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let group = group(
            "g1",
            vec![
                association("GENERIC", "USERNAME", "thycotic-tss-id", by_id("42", "username")),
                association("GENERIC", "SECRET", "thycotic-tss-id", by_id("42", "enable")),
                association("GENERIC", "PASSWORD", "thycotic-tss-id", by_id("42", "password")),
            ],
        );
        let credentials = resolver.expand_associations(Some(&group)).await.unwrap();

        assert_eq!(credentials.len(), 3);
        assert_eq!(credentials[0].value, "admin");
        assert_eq!(credentials[1].value, "");
        assert_eq!(credentials[2].value, "p@ss");
    }

    #[tokio::test]
    async fn test_expand_rejects_unsupported_provider() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        let group = group(
            "g1",
            vec![
                association("GENERIC", "USERNAME", "thycotic-tss-id", by_id("42", "username")),
                association("GENERIC", "PASSWORD", "hashicorp-vault", by_id("42", "password")),
            ],
        );
        let err = resolver.expand_associations(Some(&group)).await.unwrap_err();

        assert!(matches!(err, SecretsError::UnsupportedProvider(ref p) if p == "hashicorp-vault"));
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expand_absent_group() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        assert!(resolver.expand_associations(None).await.unwrap().is_empty());

        let mut empty = group("g1", vec![]);
        empty.associations = None;
        assert!(resolver.expand_associations(Some(&empty)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credentials_for_device_via_chassis_master() {
        let reads = Arc::new(AtomicUsize::new(0));
        let stub = StubInventory::default()
            .with_group(group(
                "g-master",
                vec![association("SSH", "USERNAME", "thycotic-tss-id", by_id("42", "username"))],
            ))
            .with_device("stack-2", None, Some("vc1"))
            .with_master("vc1", device("stack-1", Some("g-master"), Some("vc1")));
        let mut resolver = resolver_with(stub, StubBackend::new(reads.clone()));

        let credentials = resolver.credentials_for_device("stack-2").await.unwrap();

        assert_eq!(credentials.len(), 1);
        assert_eq!(credentials[0].value, "admin");
    }

    #[tokio::test]
    async fn test_credentials_for_unknown_device() {
        let reads = Arc::new(AtomicUsize::new(0));
        let mut resolver = resolver(&reads);

        assert!(resolver.credentials_for_device("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credentials_for_group_id() {
        let reads = Arc::new(AtomicUsize::new(0));
        let stub = StubInventory::default().with_group(group(
            "g1",
            vec![association("GENERIC", "PASSWORD", "thycotic-tss-id", by_id("42", "password"))],
        ));
        let mut resolver = resolver_with(stub, StubBackend::new(reads.clone()));

        let credentials = resolver.credentials_for_group_id("g1").await.unwrap();
        assert_eq!(credentials[0].value, "p@ss");
        assert!(resolver.credentials_for_group_id("g2").await.unwrap().is_empty());
    }

    #[test]
    fn test_filter_by_access_type() {
        let credentials = vec![
            credential("GENERIC", "USERNAME", "admin"),
            credential("GENERIC", "PASSWORD", "p@ss"),
            credential("SSH", "PASSWORD", "other"),
        ];

        let generic = filter_by_access_type(&credentials, "GENERIC");
        assert_eq!(
            generic,
            BTreeMap::from([
                ("username".to_string(), "admin".to_string()),
                ("password".to_string(), "p@ss".to_string()),
            ])
        );
        assert_eq!(filter_by_access_type(&credentials, "generic"), generic);
    }

    #[test]
    fn test_filter_last_write_wins() {
        let credentials = vec![
            credential("SSH", "PASSWORD", "first"),
            credential("ssh", "password", "second"),
        ];

        let ssh = filter_by_access_type(&credentials, "Ssh");
        assert_eq!(ssh.get("password").map(String::as_str), Some("second"));
        assert_eq!(ssh.len(), 1);
    }

    #[test]
    fn test_filter_no_match() {
        let credentials = vec![credential("GENERIC", "USERNAME", "admin")];
        assert!(filter_by_access_type(&credentials, "HTTP").is_empty());
    }

    #[test]
    fn test_registry() {
        let registry = ProviderRegistry::with_thycotic(SecretServerConfig::default());
        assert!(registry.supports("thycotic-tss-id"));
        assert!(registry.supports("thycotic-tss-path"));
        assert!(!registry.supports("aws-secrets-manager"));
        assert!(matches!(
            registry.slot("aws-secrets-manager"),
            Err(SecretsError::UnsupportedProvider(_))
        ));
    }
}

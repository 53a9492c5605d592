//! Nautobot Secrets Reader Library
//!
//! Resolves device credentials stored as Nautobot secrets-groups into
//! plaintext values read from Thycotic/Delinea Secret Server.

pub mod backends;
pub mod cache;
pub mod config;
pub mod error;
pub mod inventory;
pub mod resolver;

pub use backends::{SecretBackend, SecretLocator, ThycoticClient};
pub use config::Config;
pub use error::SecretsError;
pub use inventory::InventoryGateway;
pub use resolver::{filter_by_access_type, CredentialResolver, ProviderRegistry, ResolvedCredential};

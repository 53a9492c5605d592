//! Error taxonomy for credential resolution
//!
//! Lookups that find nothing are not errors: the inventory layer returns
//! `None` for those. Everything here is a failure the caller may need to act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretsError {
    /// Backend credentials or trust settings are unusable. Raised before any
    /// network call is attempted.
    #[error("Secret Server is not configured properly: {0}")]
    Configuration(String),

    /// The secret backend answered with an error.
    #[error("Thycotic Secret Server error: {0}")]
    Backend(String),

    #[error("Secret Server request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Secrets Provider ({0}) is not supported!")]
    UnsupportedProvider(String),

    #[error("No secret available. Fetch a secret from Secret Server first.")]
    NoSecretLoaded,

    #[error("Secret field '{field}' not found in secret '{secret}'.")]
    FieldNotFound { field: String, secret: String },

    #[error("Secret parameters are missing '{0}'")]
    MissingParameter(&'static str),
}

impl SecretsError {
    /// Whether this failure is confined to a single credential.
    ///
    /// Configuration and provider errors affect every credential in a group
    /// and must reach the caller.
    pub fn is_credential_scoped(&self) -> bool {
        !matches!(
            self,
            SecretsError::Configuration(_) | SecretsError::UnsupportedProvider(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SecretsError>;

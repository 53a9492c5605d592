use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, SecretsError};
use crate::inventory::SecretParameters;

/// Where a secret lives in the backend: a stable id or a folder path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SecretLocator {
    Id(String),
    Path(String),
}

impl SecretLocator {
    /// Pick the locator out of Nautobot secret parameters; the id wins when
    /// both are present.
    pub fn from_parameters(parameters: &SecretParameters) -> Result<Self> {
        match (&parameters.secret_id, &parameters.secret_path) {
            (Some(id), _) => Ok(SecretLocator::Id(id.clone())),
            (None, Some(path)) => Ok(SecretLocator::Path(path.clone())),
            (None, None) => Err(SecretsError::MissingParameter("secret_id or secret_path")),
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            SecretLocator::Id(id) => Some(id),
            SecretLocator::Path(_) => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            SecretLocator::Id(_) => None,
            SecretLocator::Path(path) => Some(path),
        }
    }
}

impl fmt::Display for SecretLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id:{}, Path: {}",
            self.id().unwrap_or("None"),
            self.path().unwrap_or("None")
        )
    }
}

/// One field of a backend secret
#[derive(Clone, PartialEq)]
pub struct SecretField {
    pub field_name: String,
    pub slug: String,
    pub value: String,
    pub is_file: bool,
    pub is_password: bool,
}

impl fmt::Debug for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretField")
            .field("field_name", &self.field_name)
            .field("slug", &self.slug)
            .field("value", &"<redacted>")
            .field("is_file", &self.is_file)
            .field("is_password", &self.is_password)
            .finish()
    }
}

/// A secret as returned by a backend, fields keyed by slug
#[derive(Debug, Clone, PartialEq)]
pub struct Secret {
    pub id: i64,
    pub name: String,
    pub folder_id: Option<i64>,
    pub fields: HashMap<String, SecretField>,
}

impl Secret {
    /// Build a secret from `(slug, value)` pairs
    pub fn new<'a>(
        id: i64,
        name: &str,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let fields = fields
            .into_iter()
            .map(|(slug, value)| {
                (
                    slug.to_string(),
                    SecretField {
                        field_name: slug.to_string(),
                        slug: slug.to_string(),
                        value: value.to_string(),
                        is_file: false,
                        is_password: slug == "password",
                    },
                )
            })
            .collect();

        Self {
            id,
            name: name.to_string(),
            folder_id: None,
            fields,
        }
    }

    /// Value of a field, looked up by slug and then by display name.
    /// Both lookups ignore case; an exact slug match wins.
    pub fn field(&self, name: &str) -> Result<&str> {
        self.fields
            .get(name)
            .or_else(|| {
                self.fields
                    .values()
                    .find(|f| f.slug.eq_ignore_ascii_case(name))
            })
            .or_else(|| {
                self.fields
                    .values()
                    .find(|f| f.field_name.eq_ignore_ascii_case(name))
            })
            .map(|f| f.value.as_str())
            .ok_or_else(|| SecretsError::FieldNotFound {
                field: name.to_string(),
                secret: self.name.clone(),
            })
    }
}

/// Trait for secret management backends (Thycotic Secret Server, ...)
#[async_trait::async_trait]
pub trait SecretBackend: Send + Sync {
    /// Read a secret from the backend
    async fn read_secret(&mut self, locator: &SecretLocator) -> Result<Secret>;

    /// Get the backend type name for display purposes
    fn backend_type(&self) -> &'static str;
}
